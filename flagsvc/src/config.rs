use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;
const DEFAULT_ERROR_TTL_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_CONTEXT_KEY: &str = "user";
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Either flags_url or flags_base must be set")]
    MissingSource,

    #[error("Unsupported URL scheme for {field}: {scheme}")]
    UnsupportedScheme { field: &'static str, scheme: String },

    #[error("base_host requires flags_base to be set")]
    BaseHostWithoutBase,

    #[error("Empty base_host")]
    EmptyBaseHost,

    #[error("Empty user_context_key")]
    EmptyUserContextKey,

    #[error("{field} cannot exceed one year")]
    TtlTooLarge { field: &'static str },

    #[error("request_timeout_secs cannot be 0")]
    ZeroRequestTimeout,
}

/// SDK configuration
///
/// Every field has a default, so an empty mapping deserializes to the
/// default config (which then fails validation until a document source is
/// set). Function-valued options are supplied through
/// [`FlagSvcBuilder`](crate::sdk::FlagSvcBuilder).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Single-file mode: every request resolves against this document.
    pub flags_url: Option<Url>,
    /// Multi-host mode: documents live at `<flags_base>/<host>.json`.
    pub flags_base: Option<Url>,
    /// Host whose document is merged under every primary document.
    pub base_host: Option<String>,
    /// Validity of successfully fetched documents.
    pub cache_ttl_secs: u64,
    /// Validity of failed fetches.
    pub error_ttl_secs: u64,
    /// Fetch on every lookup and never store anything.
    pub disable_cache: bool,
    pub request_timeout_secs: u64,
    /// Used when neither the host extractor nor the request supply a host.
    pub default_host: Option<String>,
    /// Used when the request store carries no user.
    pub default_user: Option<String>,
    /// Key of the per-request store holding the current user id.
    pub user_context_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            flags_url: None,
            flags_base: None,
            base_host: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            error_ttl_secs: DEFAULT_ERROR_TTL_SECS,
            disable_cache: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_host: None,
            default_user: None,
            user_context_key: DEFAULT_USER_CONTEXT_KEY.to_string(),
        }
    }
}

impl Config {
    /// Config resolving every request against one document.
    pub fn single_file(flags_url: Url) -> Self {
        Config {
            flags_url: Some(flags_url),
            ..Default::default()
        }
    }

    /// Config resolving each request against the document of its host.
    pub fn multi_host(flags_base: Url) -> Self {
        Config {
            flags_base: Some(flags_base),
            ..Default::default()
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn error_ttl(&self) -> Duration {
        Duration::from_secs(self.error_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validates the SDK configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.flags_url.is_none() && self.flags_base.is_none() {
            return Err(ValidationError::MissingSource);
        }

        for (field, url) in [("flags_url", &self.flags_url), ("flags_base", &self.flags_base)] {
            if let Some(url) = url
                && !matches!(url.scheme(), "http" | "https")
            {
                return Err(ValidationError::UnsupportedScheme {
                    field,
                    scheme: url.scheme().to_string(),
                });
            }
        }

        if let Some(base_host) = &self.base_host {
            if base_host.is_empty() {
                return Err(ValidationError::EmptyBaseHost);
            }
            if self.flags_base.is_none() {
                return Err(ValidationError::BaseHostWithoutBase);
            }
        }

        if self.user_context_key.is_empty() {
            return Err(ValidationError::EmptyUserContextKey);
        }

        if self.cache_ttl_secs > MAX_TTL_SECS {
            return Err(ValidationError::TtlTooLarge {
                field: "cache_ttl_secs",
            });
        }
        if self.error_ttl_secs > MAX_TTL_SECS {
            return Err(ValidationError::TtlTooLarge {
                field: "error_ttl_secs",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::ZeroRequestTimeout);
        }

        Ok(())
    }
}
