use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;

/// A GraphQL request as submitted over the HTTP or WebSocket binding.
///
/// The engine executes single-operation documents only; `operation_name` is
/// accepted for wire compatibility but not used for operation selection.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Request {
    /// The GraphQL operation (e.g., query, mutation) string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// The (optional) GraphQL operation name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    /// The (optional) GraphQL variables in the form of a JSON object.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub variables: Object,

    /// The (optional) GraphQL `extensions` of a GraphQL request.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Request {
    /// Returns a builder that builds a GraphQL [`Request`] from its components.
    ///
    /// Builder methods:
    ///
    /// * `.query(impl Into<`[`String`]`>)`
    ///   Optional.
    /// * `.operation_name(impl Into<`[`String`]`>)`
    ///   Optional.
    /// * `.variables(impl Into<`[`serde_json_bytes::Map`]`<`[`ByteString`]`, `[`Value`]`>>)`
    ///   Optional.
    /// * `.variable(impl Into<`[`ByteString`]`>, impl Into<`[`Value`]`>)`
    ///   Optional, may be called multiple times.
    /// * `.build()`
    #[builder(visibility = "pub")]
    fn new(
        query: Option<String>,
        operation_name: Option<String>,
        variables: JsonMap<ByteString, Value>,
        extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables,
            extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_camel_case_operation_name() {
        let request: Request = serde_json::from_str(
            r#"{"query":"{ hello }","operationName":"Q","variables":{"a":1}}"#,
        )
        .expect("request deserializes");
        assert_eq!(request.query.as_deref(), Some("{ hello }"));
        assert_eq!(request.operation_name.as_deref(), Some("Q"));
        assert_eq!(request.variables.get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn request_serialization_omits_empty_fields() {
        let request = Request::builder().query("{ hello }").build();
        let serialized = serde_json::to_string(&request).expect("request serializes");
        assert_eq!(serialized, r#"{"query":"{ hello }"}"#);
    }
}
