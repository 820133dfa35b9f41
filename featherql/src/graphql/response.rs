use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::graphql::Error;
use crate::json_ext::Object;

/// A GraphQL response.
///
/// `data` is absent only when the request failed before any field could be
/// resolved (e.g., the document did not parse). Partial failures carry both
/// `data` and a non-empty `errors` array.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Response {
    /// Returns a builder that builds a GraphQL [`Response`] from its components.
    ///
    /// Builder methods:
    ///
    /// * `.data(impl Into<`[`Value`]`>)`
    ///   Optional.
    /// * `.errors(impl Into<`[`Vec`]`<`[`Error`]`>>)`
    ///   Optional.
    /// * `.error(impl Into<`[`Error`]`>)`
    ///   Optional, may be called multiple times.
    /// * `.extensions(impl Into<`[`serde_json_bytes::Map`]`<`[`ByteString`]`, `[`Value`]`>>)`
    ///   Optional.
    /// * `.build()`
    #[builder(visibility = "pub")]
    fn new(
        data: Option<Value>,
        errors: Vec<Error>,
        extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            data,
            errors,
            extensions,
        }
    }

    /// Create a response carrying a single error and no data.
    pub fn from_error(error: Error) -> Self {
        Response {
            errors: vec![error],
            ..Response::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn response_serialization_omits_empty_errors() {
        let response = Response::builder().data(json!({ "hello": "world" })).build();
        let serialized = serde_json::to_string(&response).expect("response serializes");
        assert_eq!(serialized, r#"{"data":{"hello":"world"}}"#);
    }

    #[test]
    fn from_error_carries_no_data() {
        let response = Response::from_error(Error::builder().message("boom").build());
        assert_eq!(response.data, None);
        assert_eq!(response.errors.len(), 1);
    }
}
