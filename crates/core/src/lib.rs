//! aro core types: resource identity and the generic document alias.

#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod meta;

/// A schema-less resource: object, array or scalar.
pub type Document = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupVersionError {
    #[error("unexpected GroupVersion string: {0}")]
    Malformed(String),
}

/// `(group, version)`. The core group is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    /// Parse `version` or `group/version`. The empty string and a bare `/`
    /// are the empty GroupVersion.
    pub fn parse(gv: &str) -> Result<Self, GroupVersionError> {
        if gv.is_empty() || gv == "/" {
            return Ok(Self::default());
        }
        let mut parts = gv.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(version), None, None) => Ok(Self { group: String::new(), version: version.to_string() }),
            (Some(group), Some(version), None) => {
                Ok(Self { group: group.to_string(), version: version.to_string() })
            }
            _ => Err(GroupVersionError::Malformed(gv.to_string())),
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.version)
        } else {
            write!(f, "{}/{}", self.group, self.version)
        }
    }
}

/// `(group, Kind)`, written `Kind` for the core group and `Kind.group`
/// otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), kind: kind.into() }
    }

    /// Identity of a document from its `apiVersion` and `kind`.
    pub fn of(doc: &Document) -> Result<Self, GroupVersionError> {
        let gv = GroupVersion::parse(meta::api_version(doc).unwrap_or(""))?;
        Ok(Self { group: gv.group, kind: meta::kind(doc).unwrap_or("").to_string() })
    }

    pub fn is(&self, group: &str, kind: &str) -> bool {
        self.group == group && self.kind == kind
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

impl FromStr for GroupKind {
    type Err = std::convert::Infallible;

    /// Splits at the first `.`: `Deployment.apps` is kind `Deployment`,
    /// group `apps`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once('.') {
            Some((kind, group)) => Self::new(group, kind),
            None => Self::new("", s),
        })
    }
}

/// The REST-addressable plural for a kind in one API version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion { group: self.group.clone(), version: self.version.clone() }
    }

    /// Path segments of the REST endpoint: `api/v1` for the core group,
    /// `apis/<group>/<version>` otherwise, then `namespaces/<ns>` when a
    /// namespace is given, the resource and finally the object name.
    pub fn url_segments(&self, namespace: Option<&str>, name: Option<&str>) -> Vec<String> {
        let mut out = Vec::with_capacity(7);
        if self.group.is_empty() {
            out.push("api".to_string());
        } else {
            out.push("apis".to_string());
            out.push(self.group.clone());
        }
        out.push(self.version.clone());
        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            out.push("namespaces".to_string());
            out.push(ns.to_string());
        }
        out.push(self.resource.clone());
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            out.push(name.to_string());
        }
        out
    }

    pub fn url_path(&self, namespace: Option<&str>, name: Option<&str>) -> String {
        format!("/{}", self.url_segments(namespace, name).join("/"))
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}, Resource={}", self.group, self.version, self.resource)
        }
    }
}

/// `(GroupKind, namespace, name)`; unique per live object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub group_kind: GroupKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn of(doc: &Document) -> Result<Self, GroupVersionError> {
        Ok(Self {
            group_kind: GroupKind::of(doc)?,
            namespace: meta::namespace(doc).unwrap_or("").to_string(),
            name: meta::name(doc).unwrap_or("").to_string(),
        })
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group_kind)?;
        if !self.namespace.is_empty() {
            write!(f, "/{}", self.namespace)?;
        }
        write!(f, "/{}", self.name)
    }
}

pub mod prelude {
    pub use super::{Document, GroupKind, GroupVersion, GroupVersionError, GroupVersionResource, ResourceKey};
}
