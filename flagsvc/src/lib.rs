//! Multi-tenant feature flag SDK.
//!
//! Flag values are resolved per request from JSON host documents fetched
//! from a remote store:
//!
//! 1. the request's host selects the document (`<flags_base>/<host>.json`,
//!    or one fixed `flags_url`)
//! 2. documents are cached with separate TTLs for successes and failures
//! 3. an optional base document is merged under the host document
//! 4. the user scope overrides the wildcard scope (`"*"`) at the root key
//! 5. the rest of the dot-path walks nested objects
//! 6. the value is converted to the requested type
//!
//! Document format:
//!
//! ```json
//! {
//!   "*":      {"checkout": {"enabled": false, "maxItems": 100}},
//!   "user@x": {"checkout": {"enabled": true}}
//! }
//! ```

pub mod binding;
pub mod cache;
pub mod coerce;
pub mod config;
pub mod document;
pub mod errors;
pub mod fetcher;
pub mod hosts;
pub mod merger;
pub mod metrics_defs;
pub mod request;
pub mod resolver;
pub mod sdk;
pub mod users;

#[cfg(test)]
pub mod testutils;

pub use binding::RequestFlags;
pub use coerce::FromFlagValue;
pub use config::{Config, ValidationError};
pub use document::{HostDocument, WILDCARD_SCOPE};
pub use errors::{FetchError, FlagError, Result};
pub use fetcher::{DocFetcher, HttpFetcher};
pub use hosts::{HostExtractor, UrlBuilder};
pub use request::{DeadlineContext, RequestContext, RequestCtx, RequestValues};
pub use sdk::{FlagSvc, FlagSvcBuilder};
pub use users::UserExtractor;
