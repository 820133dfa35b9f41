//! Engine errors.

use displaydoc::Display;
use serde::Serialize;
use thiserror::Error;

use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::json_ext::Path;

/// Error types for the resolution of a single field.
///
/// Note that these are not returned to the client directly, but are instead
/// converted to JSON for [`struct@graphql::Error`]. Field errors are always
/// recovered locally: one failing field never aborts its siblings.
#[derive(Error, Display, Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(untagged)]
#[non_exhaustive]
pub enum FieldError {
    /// cannot resolve unknown field '{name}'
    UnknownField {
        /// The requested field name.
        name: String,
    },

    /// variable '{name}' was not provided
    UndefinedVariable {
        /// Name of the variable.
        name: String,
    },

    /// field '{name}' resolved to a scalar and cannot be sub-selected
    InvalidSubSelection {
        /// The field carrying the sub-selection.
        name: String,
    },

    /// subscription documents must select exactly one root field
    InvalidSubscription,

    /// field '{name}' does not produce a stream
    NotStreamable {
        /// The requested field name.
        name: String,
    },

    /// field '{name}' can only be resolved over the subscription transport
    StreamingOnly {
        /// The requested field name.
        name: String,
    },

    /// access to '{name}' was denied: {reason}
    Forbidden {
        /// The field that failed authorization.
        name: String,

        /// The rejection reason reported by the failing check.
        reason: String,
    },

    /// {reason}
    ResolverFailed {
        /// The reason reported by the resolver.
        reason: String,
    },
}

impl FieldError {
    /// Shorthand for a resolver-reported failure.
    pub fn resolver(reason: impl Into<String>) -> Self {
        FieldError::ResolverFailed {
            reason: reason.into(),
        }
    }

    /// Convert the field error to a GraphQL error scoped to `path`.
    pub fn to_graphql_error(&self, path: Option<Path>) -> graphql::Error {
        // Unit variants serialize to `null`; everything else becomes the
        // extensions object directly, as the variant fields are useful context.
        let mut extensions = serde_json_bytes::to_value(self)
            .ok()
            .and_then(|value| value.as_object().cloned())
            .unwrap_or_default();
        extensions
            .entry("code")
            .or_insert_with(|| self.extension_code().into());
        extensions.remove("reason");

        graphql::Error {
            message: self.to_string(),
            path,
            extensions,
        }
    }
}

impl ErrorExtension for FieldError {
    fn extension_code(&self) -> String {
        match self {
            FieldError::UnknownField { .. } => "UNKNOWN_FIELD",
            FieldError::UndefinedVariable { .. } => "UNDEFINED_VARIABLE",
            FieldError::InvalidSubSelection { .. } => "INVALID_SUBSELECTION",
            FieldError::InvalidSubscription => "INVALID_SUBSCRIPTION",
            FieldError::NotStreamable { .. } => "NOT_STREAMABLE",
            FieldError::StreamingOnly { .. } => "STREAMING_ONLY",
            FieldError::Forbidden { .. } => "FORBIDDEN",
            FieldError::ResolverFailed { .. } => "RESOLVER_ERROR",
        }
        .to_string()
    }
}

/// Error types for schema building.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum SchemaError {
    /// no query, mutation, or subscription fields were registered
    NoRegisteredFields,
}

impl ErrorExtension for SchemaError {
    fn extension_code(&self) -> String {
        match self {
            SchemaError::NoRegisteredFields => "SCHEMA_BUILD_ERROR",
        }
        .to_string()
    }
}

impl From<SchemaError> for graphql::Error {
    fn from(error: SchemaError) -> Self {
        graphql::Error::builder()
            .message(error.to_string())
            .extension_code(error.extension_code())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_ext::Value;

    #[test]
    fn field_error_converts_to_graphql_error_with_code() {
        let error = FieldError::UnknownField {
            name: "nope".to_string(),
        }
        .to_graphql_error(Some(Path::from_key("nope")));
        assert_eq!(error.message, "cannot resolve unknown field 'nope'");
        assert_eq!(error.extension_code().as_deref(), Some("UNKNOWN_FIELD"));
        assert_eq!(
            error.extensions.get("name"),
            Some(&Value::from("nope")),
            "variant fields are surfaced as extensions"
        );
    }

    #[test]
    fn forbidden_error_uses_forbidden_code() {
        let error = FieldError::Forbidden {
            name: "secret".to_string(),
            reason: "missing role".to_string(),
        }
        .to_graphql_error(None);
        assert_eq!(error.extension_code().as_deref(), Some("FORBIDDEN"));
        assert!(error.message.contains("denied"));
    }
}
