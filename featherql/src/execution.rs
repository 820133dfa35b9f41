//! The tree-walking executor.
//!
//! Walks a parsed operation against the resolved schema, calling resolver
//! functions with bound arguments and recursively projecting nested
//! selections over the returned values. Failures never escape this module:
//! parse failures and field failures are captured into the response's
//! `errors` array, and one field's failure never prevents sibling fields
//! from succeeding.

use serde_json_bytes::Value;

use crate::descriptor::ResolverBinding;
use crate::descriptor::ResolverContext;
use crate::error::FieldError;
use crate::graphql;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::spec::ArgumentValue;
use crate::spec::Operation;
use crate::spec::OperationKind;
use crate::spec::Schema;
use crate::spec::Selection;

/// Executes a query or mutation document against the schema.
///
/// `data` is `None` only when the document failed to parse; a subscription
/// document submitted here is answered with a field-free error, since
/// subscriptions run over their own transport.
pub async fn execute(
    schema: &Schema,
    query: &str,
    variables: &Object,
    context: &ResolverContext,
) -> Response {
    let operation = match Operation::parse(query) {
        Ok(operation) => operation,
        Err(err) => {
            tracing::debug!(error = %err, "document failed to parse");
            return Response::from_error(err.to_graphql_error());
        }
    };

    if operation.kind == OperationKind::Subscription {
        return Response::builder()
            .data(Value::Null)
            .error(
                graphql::Error::builder()
                    .message("subscription operations must be executed over the subscription transport")
                    .extension_code("SUBSCRIPTION_OVER_HTTP")
                    .build(),
            )
            .build();
    }

    let mut data = Object::new();
    let mut errors = Vec::new();
    for selection in &operation.selections {
        let key = selection.response_key().to_string();
        let path = Path::from_key(key.clone());
        match resolve_root_selection(schema, operation.kind, selection, variables, context, &path, &mut errors)
            .await
        {
            Ok(value) => {
                data.insert(key.as_str(), value);
            }
            Err(err) => {
                errors.push(err.to_graphql_error(Some(path)));
                data.insert(key.as_str(), Value::Null);
            }
        }
    }

    Response::builder()
        .data(Value::Object(data))
        .errors(errors)
        .build()
}

/// Resolves one top-level selection. Errors returned here are scoped to the
/// selection's result key by the caller.
async fn resolve_root_selection(
    schema: &Schema,
    kind: OperationKind,
    selection: &Selection,
    variables: &Object,
    context: &ResolverContext,
    path: &Path,
    errors: &mut Vec<graphql::Error>,
) -> Result<Value, FieldError> {
    let descriptor = schema
        .resolver(kind, &selection.name)
        .ok_or_else(|| FieldError::UnknownField {
            name: selection.name.clone(),
        })?;
    let resolve = match &descriptor.binding {
        ResolverBinding::Resolve(resolve) => resolve,
        ResolverBinding::Subscribe(_) => {
            return Err(FieldError::StreamingOnly {
                name: selection.name.clone(),
            });
        }
    };

    let arguments = evaluate_arguments(&selection.arguments, variables)?;
    let value = resolve(arguments, context.clone()).await?;

    if selection.selections.is_empty() {
        return Ok(value);
    }
    project_value(value, selection, path, errors)
}

/// Applies a non-empty sub-selection to a resolved value. Objects project
/// field-by-field, arrays element-wise; anything else cannot be sub-selected.
pub(crate) fn project_value(
    value: Value,
    selection: &Selection,
    path: &Path,
    errors: &mut Vec<graphql::Error>,
) -> Result<Value, FieldError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Object(_) | Value::Array(_) => Ok(project(value, &selection.selections, path, errors)),
        _ => Err(FieldError::InvalidSubSelection {
            name: selection.name.clone(),
        }),
    }
}

/// Recursive projection. Nested failures are recorded against their full
/// result path and null out only their own subtree.
fn project(value: Value, selections: &[Selection], path: &Path, errors: &mut Vec<graphql::Error>) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| project(item, selections, &path.join_index(index), errors))
                .collect(),
        ),
        Value::Object(map) => {
            let mut projected = Object::new();
            for selection in selections {
                let key = selection.response_key();
                let child_path = path.join_key(key);
                let child = map
                    .get(selection.name.as_str())
                    .cloned()
                    .unwrap_or(Value::Null);
                let value = if selection.selections.is_empty() {
                    child
                } else {
                    match project_value(child, selection, &child_path, errors) {
                        Ok(value) => value,
                        Err(err) => {
                            errors.push(err.to_graphql_error(Some(child_path)));
                            Value::Null
                        }
                    }
                };
                projected.insert(key, value);
            }
            Value::Object(projected)
        }
        // Reached only for list items, element-wise: a scalar item under a
        // sub-selection nulls out just that element.
        other => {
            tracing::trace!(?other, "list item cannot be sub-selected");
            Value::Null
        }
    }
}

/// Evaluates the parsed arguments into the bag handed to the resolver,
/// substituting `$name` references from the request variables.
pub(crate) fn evaluate_arguments(
    arguments: &[(String, ArgumentValue)],
    variables: &Object,
) -> Result<Object, FieldError> {
    let mut bag = Object::new();
    for (name, value) in arguments {
        bag.insert(name.as_str(), evaluate_value(value, variables)?);
    }
    Ok(bag)
}

fn evaluate_value(value: &ArgumentValue, variables: &Object) -> Result<Value, FieldError> {
    Ok(match value {
        ArgumentValue::String(s) => Value::String(s.as_str().into()),
        ArgumentValue::Number(n) => Value::Number(n.clone()),
        ArgumentValue::Boolean(b) => Value::Bool(*b),
        ArgumentValue::Null => Value::Null,
        ArgumentValue::Variable(name) => variables
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| FieldError::UndefinedVariable { name: name.clone() })?,
        ArgumentValue::Object(fields) => {
            let mut object = Object::new();
            for (name, value) in fields {
                object.insert(name.as_str(), evaluate_value(value, variables)?);
            }
            Value::Object(object)
        }
        ArgumentValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| evaluate_value(item, variables))
                .collect::<Result<_, _>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;

    use super::*;
    use crate::descriptor::FieldDescriptor;
    use crate::spec::FieldType;
    use crate::spec::ScalarKind;
    use crate::spec::SchemaDescriptors;

    fn value_field(name: &str, value: Value) -> FieldDescriptor {
        FieldDescriptor::builder()
            .name(name)
            .binding(ResolverBinding::Resolve(Arc::new(move |_args, _ctx| {
                let value = value.clone();
                async move { Ok(value) }.boxed()
            })))
            .ty(FieldType::scalar(ScalarKind::String))
            .build()
    }

    fn failing_field(name: &str, reason: &str) -> FieldDescriptor {
        let reason = reason.to_string();
        FieldDescriptor::builder()
            .name(name)
            .binding(ResolverBinding::Resolve(Arc::new(move |_args, _ctx| {
                let reason = reason.clone();
                async move { Err(FieldError::resolver(reason)) }.boxed()
            })))
            .ty(FieldType::scalar(ScalarKind::String))
            .build()
    }

    fn echo_field(name: &str) -> FieldDescriptor {
        FieldDescriptor::builder()
            .name(name)
            .binding(ResolverBinding::Resolve(Arc::new(|args, _ctx| {
                async move { Ok(args.get("name").cloned().unwrap_or(Value::Null)) }.boxed()
            })))
            .ty(FieldType::scalar(ScalarKind::String))
            .build()
    }

    fn schema(fields: Vec<FieldDescriptor>) -> Schema {
        Schema::build(&SchemaDescriptors {
            queries: fields,
            ..Default::default()
        })
        .expect("schema builds")
    }

    async fn run(schema: &Schema, query: &str) -> Response {
        execute(schema, query, &Object::new(), &ResolverContext::default()).await
    }

    #[tokio::test]
    async fn alias_replaces_the_field_name_in_data() {
        let schema = schema(vec![value_field("hello", json!("world"))]);
        let response = run(&schema, "{ greeting: hello }").await;
        assert_eq!(response.data, Some(json!({ "greeting": "world" })));
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn variables_substitute_into_arguments() {
        let schema = schema(vec![echo_field("item")]);
        let response = execute(
            &schema,
            "query Q($name: String!) { item(name: $name) }",
            json!({ "name": "widget" }).as_object().unwrap(),
            &ResolverContext::default(),
        )
        .await;
        assert_eq!(response.data, Some(json!({ "item": "widget" })));
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn undefined_variable_is_a_field_scoped_error() {
        let schema = schema(vec![echo_field("item"), value_field("ok", json!("fine"))]);
        let response = run(&schema, "{ item(name: $missing) ok }").await;
        assert_eq!(response.data, Some(json!({ "item": null, "ok": "fine" })));
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].message.contains("missing"));
    }

    #[tokio::test]
    async fn one_failing_resolver_leaves_siblings_untouched() {
        let schema = schema(vec![
            value_field("a", json!("A")),
            failing_field("b", "b blew up"),
            value_field("c", json!("C")),
        ]);
        let response = run(&schema, "{ a b c }").await;
        assert_eq!(
            response.data,
            Some(json!({ "a": "A", "b": null, "c": "C" }))
        );
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "b blew up");
        assert_eq!(
            response.errors[0].path,
            Some(Path::from_key("b")),
            "the error is scoped to the failing field's path"
        );
    }

    #[tokio::test]
    async fn unknown_field_is_isolated_too() {
        let schema = schema(vec![value_field("a", json!("A"))]);
        let response = run(&schema, "{ nope a }").await;
        assert_eq!(response.data, Some(json!({ "nope": null, "a": "A" })));
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].message.contains("unknown field 'nope'"));
    }

    #[tokio::test]
    async fn nested_projection_follows_sub_selections() {
        let schema = schema(vec![value_field(
            "me",
            json!({ "id": "u1", "profile": { "bio": "hello" }, "secret": "drop me" }),
        )]);
        let response = run(&schema, "{ me { id profile { bio } } }").await;
        assert_eq!(
            response.data,
            Some(json!({ "me": { "id": "u1", "profile": { "bio": "hello" } } }))
        );
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn arrays_project_element_wise_preserving_order() {
        let schema = schema(vec![value_field(
            "items",
            json!([{ "id": 1, "x": "a" }, { "id": 2, "x": "b" }]),
        )]);
        let response = run(&schema, "{ items { id } }").await;
        assert_eq!(
            response.data,
            Some(json!({ "items": [{ "id": 1 }, { "id": 2 }] }))
        );
    }

    #[tokio::test]
    async fn sub_selecting_a_scalar_fails_only_that_subtree() {
        let schema = schema(vec![value_field(
            "me",
            json!({ "id": "u1", "bio": "plain text" }),
        )]);
        let response = run(&schema, "{ me { id bio { words } } }").await;
        assert_eq!(
            response.data,
            Some(json!({ "me": { "id": "u1", "bio": null } }))
        );
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].path,
            Some(Path::from_key("me").join_key("bio"))
        );
    }

    #[tokio::test]
    async fn aliased_selection_never_emits_the_bare_name() {
        let schema = schema(vec![value_field("hello", json!("world"))]);
        let response = run(&schema, "{ greeting: hello }").await;
        let data = response.data.expect("data present");
        let object = data.as_object().expect("object data");
        assert!(object.get("hello").is_none());
        assert!(object.get("greeting").is_some());
    }

    #[tokio::test]
    async fn parse_failure_nulls_the_whole_data() {
        let schema = schema(vec![value_field("a", json!("A"))]);
        let response = run(&schema, "{ a").await;
        assert_eq!(response.data, None);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].extension_code().as_deref(),
            Some("GRAPHQL_PARSE_FAILED")
        );
    }

    #[tokio::test]
    async fn introspection_rejection_mentions_not_supported() {
        let schema = schema(vec![value_field("a", json!("A"))]);
        for query in ["{ __schema { types } }", "{ a me { __typename } }"] {
            let response = run(&schema, query).await;
            assert!(!response.errors.is_empty());
            assert!(
                response.errors[0].message.contains("not supported"),
                "message was: {}",
                response.errors[0].message
            );
        }
    }

    #[tokio::test]
    async fn subscription_over_http_is_refused() {
        let schema = schema(vec![value_field("a", json!("A"))]);
        let response = run(&schema, "subscription { ticks }").await;
        assert_eq!(response.data, Some(Value::Null));
        assert_eq!(
            response.errors[0].extension_code().as_deref(),
            Some("SUBSCRIPTION_OVER_HTTP")
        );
    }

    #[tokio::test]
    async fn mutations_use_the_mutation_root() {
        let schema = Schema::build(&SchemaDescriptors {
            mutations: vec![value_field("save", json!(true))],
            ..Default::default()
        })
        .expect("schema builds");
        let response = run(&schema, "mutation { save }").await;
        assert_eq!(response.data, Some(json!({ "save": true })));

        // The same field is not reachable through the query root.
        let response = run(&schema, "{ save }").await;
        assert_eq!(response.data, Some(json!({ "save": null })));
        assert_eq!(response.errors.len(), 1);
    }

    #[tokio::test]
    async fn object_and_list_literals_evaluate_recursively() {
        let schema = schema(vec![FieldDescriptor::builder()
            .name("echo")
            .binding(ResolverBinding::Resolve(Arc::new(|args, _ctx| {
                async move { Ok(args.get("input").cloned().unwrap_or(Value::Null)) }.boxed()
            })))
            .ty(FieldType::scalar(ScalarKind::String))
            .build()]);
        let response = execute(
            &schema,
            r#"query Q($tag: String) { echo(input: {tags: [$tag, "fixed"], count: 2}) }"#,
            json!({ "tag": "var" }).as_object().unwrap(),
            &ResolverContext::default(),
        )
        .await;
        assert_eq!(
            response.data,
            Some(json!({ "echo": { "tags": ["var", "fixed"], "count": 2 } }))
        );
    }
}
