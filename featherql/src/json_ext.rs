//! Extensions to the JSON value model used throughout the engine.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;

pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// A path into the `data` portion of a response, as found in the `path`
/// field of a GraphQL error.
///
/// Serializes to the flat array form mandated by the GraphQL spec,
/// e.g. `["me", "friends", 0, "name"]`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Path(pub Vec<PathElement>);

/// One step in a [`Path`]: either an object key or a list index.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    Index(usize),
    Key(String),
}

impl Path {
    pub fn from_key(key: impl Into<String>) -> Self {
        Self(vec![PathElement::Key(key.into())])
    }

    /// Returns a new path with `key` appended.
    pub fn join_key(&self, key: impl Into<String>) -> Self {
        let mut elements = self.0.clone();
        elements.push(PathElement::Key(key.into()));
        Self(elements)
    }

    /// Returns a new path with a list index appended.
    pub fn join_index(&self, index: usize) -> Self {
        let mut elements = self.0.clone();
        elements.push(PathElement::Index(index));
        Self(elements)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.0 {
            write!(f, "/")?;
            match element {
                PathElement::Index(index) => write!(f, "{index}")?,
                PathElement::Key(key) => write!(f, "{key}")?,
            }
        }
        Ok(())
    }
}
