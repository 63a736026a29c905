//! aro dynamichelper: create-or-update for schema-less resources.
//!
//! The engine resolves a document's GroupKind against a cached discovery
//! snapshot, fetches the live object, decides with a one-way comparison
//! whether an update is needed and applies it, optionally retrying on
//! write conflicts. The normalizer (`clean`, `defaults`), apply ordering,
//! workload checksum annotations and the immutable-field copy are exposed
//! for callers that assemble manifest batches themselves.

#![forbid(unsafe_code)]

/// A compiled [`aro_jsonpath::Path`] that lives for the whole program,
/// compiled on first use at this call site.
macro_rules! path {
    ($src:literal) => {{
        static PATH: ::once_cell::sync::Lazy<::aro_jsonpath::Path> =
            ::once_cell::sync::Lazy::new(|| ::aro_jsonpath::Path::must_compile($src));
        &*PATH
    }};
}

pub mod clean;
pub mod client;
pub mod defaults;
pub mod diff;
pub mod error;
pub mod hash;
pub mod helper;
pub mod immutable;
pub mod ordering;
pub mod policy;
pub mod resolve;
pub mod retry;

pub use aro_core::{Document, GroupKind, GroupVersionResource, ResourceKey};
pub use client::{KubeResourceClient, ResourceClient};
pub use error::{Error, Result};
pub use helper::{DynamicHelper, Outcome};
pub use ordering::OrderingPolicy;
pub use policy::UpdatePolicy;
pub use resolve::ApiTarget;
pub use retry::RetryConfig;

pub mod prelude {
    pub use super::{
        Document, DynamicHelper, Error, GroupKind, OrderingPolicy, Outcome, ResourceClient, ResourceKey,
        UpdatePolicy,
    };
}
