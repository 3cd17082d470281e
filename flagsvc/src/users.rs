use crate::config::Config;
use crate::request::RequestCtx;
use serde_json::Value;
use std::sync::Arc;

/// Derives the user id of a request. Replaces the default lookup entirely;
/// an empty string means "no user".
pub trait UserExtractor: Send + Sync {
    fn extract_user(&self, req: &dyn RequestCtx) -> String;
}

impl<F> UserExtractor for F
where
    F: Fn(&dyn RequestCtx) -> String + Send + Sync,
{
    fn extract_user(&self, req: &dyn RequestCtx) -> String {
        self(req)
    }
}

pub struct UserResolver {
    context_key: String,
    default_user: String,
    extractor: Option<Arc<dyn UserExtractor>>,
}

impl UserResolver {
    pub fn new(config: &Config, extractor: Option<Arc<dyn UserExtractor>>) -> Self {
        UserResolver {
            context_key: config.user_context_key.clone(),
            default_user: config.default_user.clone().unwrap_or_default(),
            extractor,
        }
    }

    /// User id of the request, or an empty string when there is none.
    pub fn resolve_user(&self, req: &dyn RequestCtx) -> String {
        if let Some(extractor) = &self.extractor {
            return extractor.extract_user(req);
        }

        match req.get(&self.context_key) {
            Some(Value::String(user)) if !user.is_empty() => user.clone(),
            _ => self.default_user.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestContext;

    #[test]
    fn test_user_from_request_store() {
        let mut config = Config::default();
        config.default_user = Some("anonymous".into());
        let resolver = UserResolver::new(&config, None);

        let req = RequestContext::new("tenant1").with_value("user", "user@x");
        assert_eq!(resolver.resolve_user(&req), "user@x");

        // Absent, non-string and empty values fall back to the default user
        let req = RequestContext::new("tenant1");
        assert_eq!(resolver.resolve_user(&req), "anonymous");
        let req = RequestContext::new("tenant1").with_value("user", 42);
        assert_eq!(resolver.resolve_user(&req), "anonymous");
        let req = RequestContext::new("tenant1").with_value("user", "");
        assert_eq!(resolver.resolve_user(&req), "anonymous");
    }

    #[test]
    fn test_custom_context_key() {
        let mut config = Config::default();
        config.user_context_key = "account".into();
        let resolver = UserResolver::new(&config, None);

        let req = RequestContext::new("tenant1")
            .with_value("user", "ignored")
            .with_value("account", "acct-7");
        assert_eq!(resolver.resolve_user(&req), "acct-7");

        let req = RequestContext::new("tenant1").with_value("user", "ignored");
        assert_eq!(resolver.resolve_user(&req), "");
    }

    #[test]
    fn test_extractor_replaces_default_lookup() {
        let mut config = Config::default();
        config.default_user = Some("anonymous".into());
        let extractor: Arc<dyn UserExtractor> =
            Arc::new(|req: &dyn RequestCtx| format!("user-of-{}", req.host()));
        let resolver = UserResolver::new(&config, Some(extractor));

        let req = RequestContext::new("tenant1").with_value("user", "user@x");
        assert_eq!(resolver.resolve_user(&req), "user-of-tenant1");
    }
}
