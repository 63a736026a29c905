//! Error taxonomy for reconciliation.

use aro_core::GroupVersionError;
use aro_jsonpath::PathError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No discovered resource matches the GroupKind.
    #[error("The groupKind '{0}' was not found.")]
    GroupKindNotFound(String),

    /// A bare Kind matched resources in more than one group.
    #[error("The groupKind '{group_kind}' matched multiple groupKinds ({}).", .candidates.join(", "))]
    AmbiguousGroupKind { group_kind: String, candidates: Vec<String> },

    /// The server advertised a GroupVersion that does not parse.
    #[error(transparent)]
    InvalidGroupVersion(#[from] GroupVersionError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic-concurrency failure (HTTP 409) on write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The document cannot be reconciled (missing kind, name, ...).
    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("kubernetes error: {0}")]
    Kube(#[source] kube::Error),
}

impl Error {
    pub fn invalid_object(msg: impl Into<String>) -> Self {
        Self::InvalidObject(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// The HTTP status class a caller should surface: 400 for requests
    /// naming unknown or ambiguous kinds and for malformed objects, the
    /// server's own status for API errors, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::GroupKindNotFound(_) | Self::AmbiguousGroupKind { .. } | Self::InvalidObject(_) | Self::Path(_) => 400,
            Self::NotFound(_) => 404,
            Self::AlreadyExists(_) | Self::Conflict(_) => 409,
            Self::Kube(kube::Error::Api(resp)) => resp.code,
            _ => 500,
        }
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) if resp.code == 404 => Self::NotFound(resp.message),
            kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                Self::AlreadyExists(resp.message)
            }
            kube::Error::Api(resp) if resp.code == 409 => Self::Conflict(resp.message),
            other => Self::Kube(other),
        }
    }
}
