use http::StatusCode;
use thiserror::Error;

/// Result type alias for flag lookups
pub type Result<T, E = FlagError> = std::result::Result<T, E>;

/// Failure to obtain a host document from the remote store.
///
/// Cloneable so that a cached failure can be handed out unchanged to every
/// caller until it expires.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("unexpected status {status} fetching {url}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("could not decode document from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Network { url, .. }
            | FetchError::HttpStatus { url, .. }
            | FetchError::Decode { url, .. } => url,
        }
    }

    /// Short label used for metric tags.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network { .. } => "network",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::Decode { .. } => "decode",
        }
    }

    pub(crate) fn network(url: &str, reason: impl ToString) -> Self {
        FetchError::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(url: &str, reason: impl ToString) -> Self {
        FetchError::Decode {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors returned by the fallible getters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlagError {
    #[error("flag key is empty")]
    EmptyKey,

    #[error("flag not found: {path}")]
    NotFound { path: String },

    #[error("cannot traverse into non-map value at {path}")]
    NonMapTraversal { path: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cannot convert {found} to {target}")]
    Coercion {
        target: &'static str,
        found: &'static str,
    },
}

impl FlagError {
    pub fn kind(&self) -> &'static str {
        match self {
            FlagError::EmptyKey => "empty_key",
            FlagError::NotFound { .. } => "not_found",
            FlagError::NonMapTraversal { .. } => "non_map_traversal",
            FlagError::Fetch(e) => e.kind(),
            FlagError::Coercion { .. } => "coercion",
        }
    }
}
