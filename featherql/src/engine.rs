//! The pluggable engine boundary and the built-in engine.
//!
//! Hosts that need full spec compliance can swap in another implementation
//! of [`GraphqlEngine`]; the capability flags tell the host whether to
//! expose a documentation UI and whether to accept subscriptions.

use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
use serde_json_bytes::Value;
use tokio::sync::OnceCell;

use crate::descriptor::ResolverBinding;
use crate::descriptor::ResolverContext;
use crate::error::FieldError;
use crate::error::SchemaError;
use crate::execution;
use crate::graphql;
use crate::graphql::Request;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::spec::Operation;
use crate::spec::OperationKind;
use crate::spec::Schema;
use crate::spec::SchemaDescriptors;
use crate::spec::Selection;

/// The lazy value sequence backing one subscription, plus its cancel
/// operation.
///
/// The subscription handler only ever calls [`next_value`] and [`close`];
/// it never assumes a particular underlying concurrency primitive.
/// `close` is idempotent and must not fail when the sequence is already
/// exhausted, so a resolver's cleanup hook runs at most once.
///
/// [`next_value`]: StreamingHandle::next_value
/// [`close`]: StreamingHandle::close
pub struct StreamingHandle {
    values: Pin<Box<dyn Stream<Item = Result<Value, FieldError>> + Send>>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for StreamingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingHandle").finish_non_exhaustive()
    }
}

impl StreamingHandle {
    /// Wraps a value stream with no cleanup hook.
    pub fn new(values: impl Stream<Item = Result<Value, FieldError>> + Send + 'static) -> Self {
        Self {
            values: Box::pin(values),
            on_close: None,
        }
    }

    /// Wraps a value stream with a cleanup hook invoked on the first
    /// [`close`](StreamingHandle::close).
    pub fn with_close(
        values: impl Stream<Item = Result<Value, FieldError>> + Send + 'static,
        on_close: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            values: Box::pin(values),
            on_close: Some(Box::new(on_close)),
        }
    }

    /// Pulls the next value, or `None` when the sequence is exhausted.
    pub async fn next_value(&mut self) -> Option<Result<Value, FieldError>> {
        self.values.next().await
    }

    /// Force-terminates the sequence early. Idempotent.
    pub fn close(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl Stream for StreamingHandle {
    type Item = Result<Value, FieldError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().values.as_mut().poll_next(cx)
    }
}

/// The engine plug-point.
///
/// The built-in engine trades spec compliance for zero external machinery;
/// implementations backed by a full query-language stack can replace it
/// wholesale as long as they honor this contract.
#[async_trait]
pub trait GraphqlEngine: Send + Sync {
    /// Builds (or returns the already-built) schema and renders its SDL.
    async fn sdl(&self) -> Result<String, SchemaError>;

    /// Executes a query or mutation document. Never fails past this
    /// boundary: failures are reported in the response's `errors`.
    async fn execute(&self, request: &Request, context: &ResolverContext) -> Response;

    /// Opens a streaming handle for a subscription document.
    async fn subscribe(
        &self,
        request: &Request,
        context: &ResolverContext,
    ) -> Result<StreamingHandle, graphql::Error> {
        let _ = (request, context);
        Err(graphql::Error::builder()
            .message("subscriptions are not supported by this engine")
            .extension_code("SUBSCRIPTION_NOT_SUPPORTED")
            .build())
    }

    /// Whether introspection queries are answered (drives the host's
    /// decision to expose a documentation UI).
    fn supports_introspection(&self) -> bool {
        false
    }

    /// Whether [`subscribe`](GraphqlEngine::subscribe) is implemented.
    fn supports_subscriptions(&self) -> bool {
        false
    }
}

/// The built-in lightweight engine.
///
/// The schema is built lazily, at most once: concurrent callers await the
/// single build attempt, and a build failure is cached and re-raised to
/// every later caller rather than retried.
pub struct FeatherEngine {
    descriptors: SchemaDescriptors,
    schema: OnceCell<Result<Arc<Schema>, SchemaError>>,
}

impl FeatherEngine {
    pub fn new(descriptors: SchemaDescriptors) -> Self {
        Self {
            descriptors,
            schema: OnceCell::new(),
        }
    }

    /// The resolved schema, building it on first use.
    pub async fn schema(&self) -> Result<Arc<Schema>, SchemaError> {
        self.schema
            .get_or_init(|| async {
                tracing::debug!("building schema from descriptors");
                Schema::build(&self.descriptors).map(Arc::new)
            })
            .await
            .clone()
    }
}

#[async_trait]
impl GraphqlEngine for FeatherEngine {
    async fn sdl(&self) -> Result<String, SchemaError> {
        Ok(self.schema().await?.sdl().to_string())
    }

    async fn execute(&self, request: &Request, context: &ResolverContext) -> Response {
        let schema = match self.schema().await {
            Ok(schema) => schema,
            Err(err) => {
                tracing::error!(error = %err, "schema build failed");
                return Response::from_error(err.into());
            }
        };
        execution::execute(
            &schema,
            request.query.as_deref().unwrap_or_default(),
            &request.variables,
            context,
        )
        .await
    }

    async fn subscribe(
        &self,
        request: &Request,
        context: &ResolverContext,
    ) -> Result<StreamingHandle, graphql::Error> {
        let schema = self
            .schema()
            .await
            .map_err(graphql::Error::from)?;
        let operation = Operation::parse(request.query.as_deref().unwrap_or_default())
            .map_err(|err| err.to_graphql_error())?;
        if operation.kind != OperationKind::Subscription {
            return Err(graphql::Error::builder()
                .message("only subscription operations can be subscribed")
                .extension_code("SUBSCRIPTION_EXPECTED")
                .build());
        }
        let [selection] = operation.selections.as_slice() else {
            return Err(FieldError::InvalidSubscription.to_graphql_error(None));
        };

        let path = Path::from_key(selection.response_key());
        let descriptor = schema
            .resolver(OperationKind::Subscription, &selection.name)
            .ok_or_else(|| {
                FieldError::UnknownField {
                    name: selection.name.clone(),
                }
                .to_graphql_error(Some(path.clone()))
            })?;
        let subscribe = match &descriptor.binding {
            ResolverBinding::Subscribe(subscribe) => subscribe,
            ResolverBinding::Resolve(_) => {
                return Err(FieldError::NotStreamable {
                    name: selection.name.clone(),
                }
                .to_graphql_error(Some(path)));
            }
        };

        let arguments = execution::evaluate_arguments(&selection.arguments, &request.variables)
            .map_err(|err| err.to_graphql_error(Some(path.clone())))?;
        let handle = subscribe(arguments, context.clone())
            .await
            .map_err(|err| err.to_graphql_error(Some(path)))?;
        Ok(project_stream(handle, selection.clone()))
    }

    fn supports_introspection(&self) -> bool {
        false
    }

    fn supports_subscriptions(&self) -> bool {
        true
    }
}

/// Wraps a resolver's raw value stream so each emitted value is projected
/// through the subscription's selection and keyed under its response key,
/// ready to be sent as the `data` of a `next` message.
fn project_stream(handle: StreamingHandle, selection: Selection) -> StreamingHandle {
    let StreamingHandle { values, on_close } = handle;
    let key = selection.response_key().to_string();
    let path = Path::from_key(key.clone());
    let mapped = values.map(move |item| {
        let value = item?;
        let projected = if selection.selections.is_empty() {
            value
        } else {
            let mut errors = Vec::new();
            let projected = execution::project_value(value, &selection, &path, &mut errors)?;
            if let Some(first) = errors.into_iter().next() {
                // A nested projection failure fails the whole event rather
                // than emitting a partially nulled payload.
                return Err(FieldError::resolver(first.message));
            }
            projected
        };
        let mut data = Object::new();
        data.insert(key.as_str(), projected);
        Ok(Value::Object(data))
    });
    StreamingHandle {
        values: Box::pin(mapped),
        on_close,
    }
}
