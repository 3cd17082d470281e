use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Scope name holding the defaults that apply to every user.
pub const WILDCARD_SCOPE: &str = "*";

/// Top-level configuration keys of one scope, mapped to arbitrary JSON.
pub type ScopeMap = Map<String, Value>;

/// The decoded form of one remote `<host>.json` document: scope name to
/// scope map. Scope names are either [`WILDCARD_SCOPE`] or a user id.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HostDocument {
    scopes: IndexMap<String, ScopeMap>,
}

impl HostDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self, name: &str) -> Option<&ScopeMap> {
        self.scopes.get(name)
    }

    pub fn wildcard(&self) -> Option<&ScopeMap> {
        self.scope(WILDCARD_SCOPE)
    }

    /// Value of `key` in `scope`, if both exist. A stored JSON null is
    /// returned as `Some(&Value::Null)`.
    pub fn lookup(&self, scope: &str, key: &str) -> Option<&Value> {
        self.scope(scope).and_then(|map| map.get(key))
    }

    pub fn insert_scope(&mut self, name: impl Into<String>, map: ScopeMap) -> Option<ScopeMap> {
        self.scopes.insert(name.into(), map)
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&String, &ScopeMap)> {
        self.scopes.iter()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl FromIterator<(String, ScopeMap)> for HostDocument {
    fn from_iter<I: IntoIterator<Item = (String, ScopeMap)>>(iter: I) -> Self {
        HostDocument {
            scopes: iter.into_iter().collect(),
        }
    }
}

impl<'de> Deserialize<'de> for HostDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(HostDocumentVisitor)
    }
}

struct HostDocumentVisitor;

impl<'de> Visitor<'de> for HostDocumentVisitor {
    type Value = HostDocument;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an object mapping scope names to objects")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut scopes = IndexMap::with_capacity(access.size_hint().unwrap_or(0));

        while let Some(scope) = access.next_key::<String>()? {
            if scopes.contains_key(&scope) {
                return Err(de::Error::custom(format!("duplicate scope `{scope}`")));
            }
            let map: ScopeMap = access.next_value()?;
            scopes.insert(scope, map);
        }

        Ok(HostDocument { scopes })
    }
}
