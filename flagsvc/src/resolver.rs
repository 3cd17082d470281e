//! Request-scoped value resolution over already loaded documents.
//!
//! The first segment of a dot-path (the root key) is looked up in the
//! scope maps, the user scope overriding the wildcard scope. Remaining
//! segments walk nested objects.

use crate::document::{HostDocument, WILDCARD_SCOPE};
use crate::errors::FlagError;
use serde_json::Value;
use std::sync::Arc;

/// Documents a lookup resolves against.
#[derive(Clone, Debug)]
pub struct ResolvedDocuments {
    /// Primary document with the base document merged under it.
    pub merged: Arc<HostDocument>,
    /// Base document consulted when the merged document lacks the root key.
    /// Only set when the base document differs from the primary one.
    pub fallback: Option<Arc<HostDocument>>,
}

impl ResolvedDocuments {
    pub fn single(document: Arc<HostDocument>) -> Self {
        ResolvedDocuments {
            merged: document,
            fallback: None,
        }
    }
}

/// Resolves `path` for `user` (empty for none).
pub fn resolve_value(
    documents: &ResolvedDocuments,
    user: &str,
    path: &str,
) -> Result<Value, FlagError> {
    if path.is_empty() {
        return Err(FlagError::EmptyKey);
    }

    let mut segments = path.split('.');
    let root = segments.next().unwrap_or_default();

    let mut current = lookup_root(&documents.merged, user, root)
        .or_else(|| {
            documents
                .fallback
                .as_deref()
                .and_then(|base| lookup_root(base, user, root))
        })
        .ok_or_else(|| FlagError::NotFound {
            path: root.to_string(),
        })?;

    let mut walked = root.to_string();
    for segment in segments {
        let map = current
            .as_object()
            .ok_or_else(|| FlagError::NonMapTraversal {
                path: walked.clone(),
            })?;

        walked.push('.');
        walked.push_str(segment);

        current = map.get(segment).ok_or_else(|| FlagError::NotFound {
            path: walked.clone(),
        })?;
    }

    Ok(current.clone())
}

fn lookup_root<'a>(document: &'a HostDocument, user: &str, root: &str) -> Option<&'a Value> {
    let wildcard = document.lookup(WILDCARD_SCOPE, root);

    if !user.is_empty()
        && let Some(value) = document.lookup(user, root)
    {
        return Some(value);
    }

    wildcard
}
