//! Deep merge of a primary host document over a base document.
//!
//! - Scopes: union of both documents
//! - Nested objects present on both sides: merged recursively
//! - Everything else, arrays included: the primary value replaces the base value
//! - Keys present on one side only: taken unchanged

use crate::document::{HostDocument, ScopeMap};
use serde_json::Value;

/// Merges `base` under `primary`. Either side may be absent.
pub fn merge_documents(primary: Option<&HostDocument>, base: Option<&HostDocument>) -> HostDocument {
    let (primary, base) = match (primary, base) {
        (Some(primary), Some(base)) => (primary, base),
        (Some(only), None) | (None, Some(only)) => return only.clone(),
        (None, None) => return HostDocument::new(),
    };

    let mut merged: HostDocument = primary
        .scopes()
        .map(|(scope, primary_map)| {
            let map = match base.scope(scope) {
                Some(base_map) => merge_maps(primary_map, base_map),
                None => primary_map.clone(),
            };
            (scope.clone(), map)
        })
        .collect();

    for (scope, base_map) in base.scopes() {
        if primary.scope(scope).is_none() {
            merged.insert_scope(scope.clone(), base_map.clone());
        }
    }

    merged
}

/// Merges two maps, `primary` winning at every leaf.
pub fn merge_maps(primary: &ScopeMap, base: &ScopeMap) -> ScopeMap {
    let mut merged = base.clone();

    for (key, primary_value) in primary {
        let value = match (primary_value, merged.get(key)) {
            (Value::Object(primary_map), Some(Value::Object(base_map))) => {
                Value::Object(merge_maps(primary_map, base_map))
            }
            _ => primary_value.clone(),
        };
        merged.insert(key.clone(), value);
    }

    merged
}
