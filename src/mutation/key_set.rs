use crate::core::Value;
use serde::{Deserialize, Serialize};

/// Rows addressed by a delete, either explicit primary keys or the whole table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    #[serde(default)]
    pub keys: Vec<Vec<Value>>,
    #[serde(default)]
    pub all: bool,
}

impl KeySet {
    pub fn all() -> Self {
        Self {
            keys: Vec::new(),
            all: true,
        }
    }

    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: IntoIterator<Item = Value>,
    {
        Self {
            keys: keys.into_iter().map(|k| k.into_iter().collect()).collect(),
            all: false,
        }
    }

    /// Single-column key shorthand
    pub fn key(value: impl Into<Value>) -> Self {
        Self {
            keys: vec![vec![value.into()]],
            all: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.keys.is_empty()
    }
}
