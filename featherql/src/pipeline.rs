//! The execution pipeline adapter.
//!
//! Wraps a single field resolution with the host's authorization and
//! observation concerns. The execution engine itself never consults this
//! module; it is called by the host's request-handling code, so the engine
//! stays usable standalone without any authorization concept.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json_bytes::Value;

use crate::descriptor::ResolverContext;
use crate::error::FieldError;
use crate::spec::OperationKind;

/// The future produced by the wrapped resolver call.
pub type ResolveFuture = BoxFuture<'static, Result<Value, FieldError>>;

/// What is being resolved, as reported to guards and interceptors.
#[derive(Clone, Debug)]
pub struct FieldContext {
    /// The resolver's owning type name.
    pub parent_type: String,
    pub field_name: String,
    pub operation_kind: OperationKind,
}

/// An authorization check. Returning `Err` with a reason rejects the field.
#[async_trait]
pub trait Guard: Send + Sync {
    async fn check(&self, field: &FieldContext, context: &ResolverContext) -> Result<(), String>;
}

/// Around-style wrapping logic running between authorization and the actual
/// resolver call.
#[async_trait]
pub trait FieldInterceptor: Send + Sync {
    async fn around(
        &self,
        field: &FieldContext,
        context: &ResolverContext,
        next: ResolveFuture,
    ) -> Result<Value, FieldError>;
}

/// Ordered guards and interceptors for one host application.
///
/// Guards run class-level first, then method-level, then globally registered
/// ones, short-circuiting on the first rejection. Interceptors wrap the
/// resolver call outside-in, in registration order.
#[derive(Clone, Default)]
pub struct FieldPipeline {
    class_guards: Vec<Arc<dyn Guard>>,
    method_guards: Vec<Arc<dyn Guard>>,
    global_guards: Vec<Arc<dyn Guard>>,
    interceptors: Vec<Arc<dyn FieldInterceptor>>,
}

#[buildstructor::buildstructor]
impl FieldPipeline {
    /// Returns a builder that builds a [`FieldPipeline`].
    ///
    /// Builder methods: `.class_guard(..)`, `.method_guard(..)`,
    /// `.global_guard(..)` and `.interceptor(..)`, each repeatable.
    #[builder(visibility = "pub")]
    fn new(
        class_guards: Vec<Arc<dyn Guard>>,
        method_guards: Vec<Arc<dyn Guard>>,
        global_guards: Vec<Arc<dyn Guard>>,
        interceptors: Vec<Arc<dyn FieldInterceptor>>,
    ) -> Self {
        Self {
            class_guards,
            method_guards,
            global_guards,
            interceptors,
        }
    }
}

impl FieldPipeline {
    /// Runs the guard chain, then the interceptor chain, then the resolver.
    ///
    /// A rejection fails the whole field with [`FieldError::Forbidden`];
    /// the rejection only short-circuits the field being authorized, never
    /// its siblings.
    pub async fn resolve_field(
        &self,
        field: &FieldContext,
        context: &ResolverContext,
        resolve: ResolveFuture,
    ) -> Result<Value, FieldError> {
        for guard in self
            .class_guards
            .iter()
            .chain(&self.method_guards)
            .chain(&self.global_guards)
        {
            if let Err(reason) = guard.check(field, context).await {
                tracing::debug!(
                    field = %field.field_name,
                    %reason,
                    "field rejected by authorization guard"
                );
                return Err(FieldError::Forbidden {
                    name: field.field_name.clone(),
                    reason,
                });
            }
        }

        let mut next = resolve;
        for interceptor in self.interceptors.iter().rev() {
            let interceptor = Arc::clone(interceptor);
            let field = field.clone();
            let context = context.clone();
            next = Box::pin(async move { interceptor.around(&field, &context, next).await });
        }
        next.await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use futures::FutureExt;
    use serde_json_bytes::json;

    use super::*;
    use crate::graphql::ErrorExtension;

    struct AllowGuard {
        log: Arc<Mutex<Vec<&'static str>>>,
        label: &'static str,
    }

    #[async_trait]
    impl Guard for AllowGuard {
        async fn check(&self, _: &FieldContext, _: &ResolverContext) -> Result<(), String> {
            self.log.lock().unwrap().push(self.label);
            Ok(())
        }
    }

    struct DenyGuard {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Guard for DenyGuard {
        async fn check(&self, _: &FieldContext, _: &ResolverContext) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("missing role".to_string())
        }
    }

    struct TagInterceptor {
        tag: &'static str,
    }

    #[async_trait]
    impl FieldInterceptor for TagInterceptor {
        async fn around(
            &self,
            _: &FieldContext,
            _: &ResolverContext,
            next: ResolveFuture,
        ) -> Result<Value, FieldError> {
            let value = next.await?;
            Ok(json!(format!(
                "{}({})",
                self.tag,
                value.as_str().unwrap_or_default()
            )))
        }
    }

    fn field() -> FieldContext {
        FieldContext {
            parent_type: "Query".to_string(),
            field_name: "secret".to_string(),
            operation_kind: OperationKind::Query,
        }
    }

    #[tokio::test]
    async fn guards_run_class_then_method_then_global() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = FieldPipeline::builder()
            .global_guard(Arc::new(AllowGuard {
                log: log.clone(),
                label: "global",
            }) as Arc<dyn Guard>)
            .class_guard(Arc::new(AllowGuard {
                log: log.clone(),
                label: "class",
            }) as Arc<dyn Guard>)
            .method_guard(Arc::new(AllowGuard {
                log: log.clone(),
                label: "method",
            }) as Arc<dyn Guard>)
            .build();
        let result = pipeline
            .resolve_field(
                &field(),
                &ResolverContext::default(),
                async { Ok(json!("ok")) }.boxed(),
            )
            .await;
        assert_eq!(result.unwrap(), json!("ok"));
        assert_eq!(*log.lock().unwrap(), vec!["class", "method", "global"]);
    }

    #[tokio::test]
    async fn first_rejection_short_circuits_with_forbidden() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver_ran = Arc::new(AtomicUsize::new(0));
        let pipeline = FieldPipeline::builder()
            .class_guard(Arc::new(DenyGuard {
                calls: calls.clone(),
            }) as Arc<dyn Guard>)
            .method_guard(Arc::new(DenyGuard {
                calls: calls.clone(),
            }) as Arc<dyn Guard>)
            .build();
        let ran = resolver_ran.clone();
        let result = pipeline
            .resolve_field(
                &field(),
                &ResolverContext::default(),
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(json!("ok"))
                }
                .boxed(),
            )
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.extension_code(), "FORBIDDEN");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second guard never runs");
        assert_eq!(resolver_ran.load(Ordering::SeqCst), 0, "resolver never runs");
    }

    #[tokio::test]
    async fn interceptors_wrap_outside_in_registration_order() {
        let pipeline = FieldPipeline::builder()
            .interceptor(Arc::new(TagInterceptor { tag: "outer" }) as Arc<dyn FieldInterceptor>)
            .interceptor(Arc::new(TagInterceptor { tag: "inner" }) as Arc<dyn FieldInterceptor>)
            .build();
        let result = pipeline
            .resolve_field(
                &field(),
                &ResolverContext::default(),
                async { Ok(json!("value")) }.boxed(),
            )
            .await;
        assert_eq!(result.unwrap(), json!("outer(inner(value))"));
    }
}
