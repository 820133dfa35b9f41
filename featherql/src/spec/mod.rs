//! The query language: AST, parser, type shapes and the schema builder.

mod field_type;
pub(crate) mod query;
mod schema;
mod selection;

use displaydoc::Display;
pub use field_type::FieldType;
pub use field_type::ScalarKind;
pub use field_type::TypeRef;
pub use query::Operation;
pub use query::OperationKind;
pub use schema::Schema;
pub use schema::SchemaDescriptors;
pub use selection::ArgumentValue;
pub use selection::Selection;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::json_ext::Object;

/// Query language parsing errors. Fatal to the whole document.
#[derive(Error, Debug, Display, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SpecError {
    /// syntax error at byte {offset}: expected {expected}, found {found}
    Syntax {
        /// Byte offset of the offending input.
        offset: usize,
        /// What the parser was looking for.
        expected: String,
        /// What it found instead.
        found: String,
    },
    /// {construct} is not supported by this engine
    UnsupportedConstruct {
        /// The rejected construct, e.g. "fragment spread".
        construct: String,
        /// Byte offset of the offending input.
        offset: usize,
    },
    /// selection nesting exceeds the recursion limit
    RecursionLimitExceeded,
}

impl SpecError {
    /// Convert the parse failure to a GraphQL error carrying the byte offset
    /// in its extensions.
    pub fn to_graphql_error(&self) -> graphql::Error {
        let mut extensions = Object::new();
        match self {
            SpecError::Syntax { offset, .. } | SpecError::UnsupportedConstruct { offset, .. } => {
                extensions.insert("offset", (*offset).into());
            }
            SpecError::RecursionLimitExceeded => {}
        }
        extensions.insert("code", self.extension_code().into());
        graphql::Error {
            message: self.to_string(),
            path: None,
            extensions,
        }
    }
}

impl ErrorExtension for SpecError {
    fn extension_code(&self) -> String {
        match self {
            SpecError::Syntax { .. } => "GRAPHQL_PARSE_FAILED",
            SpecError::UnsupportedConstruct { .. } => "UNSUPPORTED_CONSTRUCT",
            SpecError::RecursionLimitExceeded => "RECURSION_LIMIT_EXCEEDED",
        }
        .to_string()
    }
}
