//! End-to-end tests exercising the public API the way a host application
//! would: declare descriptors, build the engine lazily, execute documents
//! and open subscriptions.

use std::sync::Arc;

use featherql::FeatherEngine;
use featherql::FieldDescriptor;
use featherql::FieldPipeline;
use featherql::FieldType;
use featherql::GraphqlEngine;
use featherql::ParamBinding;
use featherql::ResolverBinding;
use featherql::ResolverContext;
use featherql::ScalarKind;
use featherql::SchemaDescriptors;
use featherql::StreamingHandle;
use featherql::TypeDescriptor;
use featherql::TypeFieldDescriptor;
use featherql::Value;
use featherql::graphql::Request;
use featherql::pipeline::FieldContext;
use featherql::pipeline::Guard;
use featherql::spec::OperationKind;
use futures::FutureExt;
use futures::stream;
use serde_json_bytes::json;

fn user_schema() -> SchemaDescriptors {
    SchemaDescriptors::builder()
        .query(
            FieldDescriptor::builder()
                .name("user")
                .binding(ResolverBinding::Resolve(Arc::new(|args, _ctx| {
                    let id = args.get("id").cloned().unwrap_or(Value::Null);
                    async move {
                        Ok(json!({
                            "id": id,
                            "name": "Ada",
                            "email": "ada@example.com",
                        }))
                    }
                    .boxed()
                })))
                .param(ParamBinding::Arg {
                    name: "id".to_string(),
                    ty: FieldType::scalar(ScalarKind::Id),
                })
                .ty(FieldType::object("User"))
                .description("Look up a user by id")
                .build(),
        )
        .subscription(
            FieldDescriptor::builder()
                .name("userUpdated")
                .parent_type("Subscription")
                .binding(ResolverBinding::Subscribe(Arc::new(|_args, _ctx| {
                    async move {
                        Ok(StreamingHandle::new(stream::iter(vec![
                            Ok(json!({ "id": "u1", "name": "Ada", "email": "hidden" })),
                        ])))
                    }
                    .boxed()
                })))
                .ty(FieldType::object("User"))
                .build(),
        )
        .type_descriptor(
            TypeDescriptor::builder()
                .name("User")
                .field(
                    TypeFieldDescriptor::builder()
                        .name("id")
                        .ty(FieldType::scalar(ScalarKind::Id))
                        .build(),
                )
                .field(
                    TypeFieldDescriptor::builder()
                        .name("name")
                        .ty(FieldType::scalar(ScalarKind::String))
                        .build(),
                )
                .field(
                    TypeFieldDescriptor::builder()
                        .name("email")
                        .ty(FieldType::scalar(ScalarKind::String).nullable())
                        .build(),
                )
                .build(),
        )
        .build()
}

#[tokio::test]
async fn sdl_describes_roots_and_discovered_types() {
    let engine = FeatherEngine::new(user_schema());
    let sdl = engine.sdl().await.expect("schema builds");
    assert!(sdl.contains("type Query {"));
    assert!(sdl.contains("user(id: ID!): User!"));
    assert!(sdl.contains("type Subscription {"));
    assert!(sdl.contains("type User {"));
    assert_eq!(sdl.matches("type User {").count(), 1);
}

#[tokio::test]
async fn execute_projects_the_requested_fields_only() {
    let engine = FeatherEngine::new(user_schema());
    let request = Request::builder()
        .query("query Q($id: ID!) { account: user(id: $id) { id name } }")
        .variable("id", "u1")
        .build();
    let response = engine.execute(&request, &ResolverContext::default()).await;
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({ "account": { "id": "u1", "name": "Ada" } }))
    );
}

#[tokio::test]
async fn subscription_events_respect_the_sub_selection() {
    let engine = FeatherEngine::new(user_schema());
    let request = Request::builder()
        .query("subscription { userUpdated { id name } }")
        .build();
    let mut handle = engine
        .subscribe(&request, &ResolverContext::default())
        .await
        .expect("subscribes");
    assert_eq!(
        handle.next_value().await.unwrap().unwrap(),
        json!({ "userUpdated": { "id": "u1", "name": "Ada" } })
    );
    assert!(handle.next_value().await.is_none());
}

struct RoleGuard;

#[async_trait::async_trait]
impl Guard for RoleGuard {
    async fn check(&self, field: &FieldContext, context: &ResolverContext) -> Result<(), String> {
        match context.get("role").and_then(Value::as_str) {
            Some("admin") => Ok(()),
            _ => Err(format!("{} requires the admin role", field.field_name)),
        }
    }
}

#[tokio::test]
async fn pipeline_guard_gates_a_resolver_on_request_context() {
    let pipeline = FieldPipeline::builder()
        .global_guard(Arc::new(RoleGuard) as Arc<dyn Guard>)
        .build();
    let field = FieldContext {
        parent_type: "Query".to_string(),
        field_name: "user".to_string(),
        operation_kind: OperationKind::Query,
    };

    let admin = ResolverContext::new(
        json!({ "role": "admin" }).as_object().cloned().unwrap(),
    );
    let allowed = pipeline
        .resolve_field(&field, &admin, async { Ok(json!("ok")) }.boxed())
        .await;
    assert_eq!(allowed.unwrap(), json!("ok"));

    let anonymous = ResolverContext::default();
    let denied = pipeline
        .resolve_field(&field, &anonymous, async { Ok(json!("ok")) }.boxed())
        .await;
    let err = denied.unwrap_err();
    assert!(err.to_string().contains("requires the admin role"));
}
