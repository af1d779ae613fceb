//! Read-only view over the host's configuration tree.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Separator between the segments of a configuration key, as in
/// `Extensions:Sources:0`.
pub const KEY_DELIMITER: char = ':';

/// Cheaply clonable configuration tree.
///
/// Keys are matched case-insensitively when no exact match exists, and
/// numeric segments index into arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration(Arc<Value>);

impl Configuration {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn empty() -> Self {
        Self::new(Value::Object(serde_json::Map::new()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Look up the value at a `:`-separated key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if key.is_empty() {
            return Some(&self.0);
        }
        key.split(KEY_DELIMITER)
            .try_fold(self.0.as_ref(), |current, segment| lookup(current, segment))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Sub-tree at `key`; an empty tree when the key is absent.
    pub fn section(&self, key: &str) -> Configuration {
        match self.get(key) {
            Some(value) => Self::new(value.clone()),
            None => Self::new(Value::Null),
        }
    }

    /// Whether the tree holds anything at all.
    pub fn exists(&self) -> bool {
        match self.0.as_ref() {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            _ => true,
        }
    }

    /// Deserialize the whole tree into `T`.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.0.as_ref())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Configuration {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

fn lookup<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment).or_else(|| {
            map.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(segment))
                .map(|(_, value)| value)
        }),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
