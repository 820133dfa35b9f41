//! Declarative field and type descriptors.
//!
//! The host constructs these records up front and hands them to the schema
//! builder as plain data. There is no global registry and no hidden metadata:
//! multiple independent schemas can coexist in one process. Dispatch is a
//! direct function call resolved once at registration time, never a runtime
//! name lookup per invocation.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::engine::StreamingHandle;
use crate::error::FieldError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::spec::FieldType;
use crate::spec::TypeRef;

/// A resolver for a query or mutation field. Receives the evaluated argument
/// bag and the ambient request context.
pub type ResolveFn =
    Arc<dyn Fn(Object, ResolverContext) -> BoxFuture<'static, Result<Value, FieldError>> + Send + Sync>;

/// A resolver for a subscription field. Returns the streaming handle whose
/// values the subscription protocol forwards to the client.
pub type SubscribeFn = Arc<
    dyn Fn(Object, ResolverContext) -> BoxFuture<'static, Result<StreamingHandle, FieldError>>
        + Send
        + Sync,
>;

/// Ambient per-request context made available to resolvers, guards and
/// interceptors. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct ResolverContext {
    values: Arc<Object>,
}

impl ResolverContext {
    pub fn new(values: Object) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// The function bound to a field, tagged by whether it resolves a single
/// value or opens a stream.
#[derive(Clone)]
pub enum ResolverBinding {
    Resolve(ResolveFn),
    Subscribe(SubscribeFn),
}

impl fmt::Debug for ResolverBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverBinding::Resolve(_) => f.write_str("Resolve(..)"),
            ResolverBinding::Subscribe(_) => f.write_str("Subscribe(..)"),
        }
    }
}

/// One declared parameter of a resolver.
#[derive(Clone, Debug)]
pub enum ParamBinding {
    /// Bind a single request argument by name. Renders as an SDL argument.
    Arg {
        name: String,
        ty: FieldType,
    },
    /// Bind the whole argument bag. The declared input type, when present,
    /// participates in type discovery but is skipped by the SDL generator
    /// and its shape is not validated against incoming arguments.
    ArgBag {
        input: Option<TypeRef>,
    },
    /// Bind the execution context.
    Context,
}

/// Immutable binding from a field name to the function that computes its
/// value. Registered once at schema-build time; read-only thereafter, so
/// concurrent in-flight requests can share it freely.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub name: String,
    /// The resolver's owning type, as reported to the authorization
    /// pipeline. Defaults to the root type name.
    pub parent_type: String,
    pub binding: ResolverBinding,
    pub params: Vec<ParamBinding>,
    pub ty: FieldType,
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

#[buildstructor::buildstructor]
impl FieldDescriptor {
    /// Returns a builder that builds a [`FieldDescriptor`] from its components.
    ///
    /// Builder methods:
    ///
    /// * `.name(impl Into<`[`String`]`>)`
    ///   Required.
    /// * `.parent_type(impl Into<`[`String`]`>)`
    ///   Optional, defaults to `"Query"`.
    /// * `.binding(`[`ResolverBinding`]`)`
    ///   Required.
    /// * `.param(`[`ParamBinding`]`)`
    ///   Optional, may be called multiple times.
    /// * `.ty(`[`FieldType`]`)`
    ///   Required.
    /// * `.description(impl Into<`[`String`]`>)`
    ///   Optional.
    /// * `.deprecation(impl Into<`[`String`]`>)`
    ///   Optional.
    /// * `.build()`
    #[builder(visibility = "pub")]
    fn new(
        name: String,
        parent_type: Option<String>,
        binding: ResolverBinding,
        params: Vec<ParamBinding>,
        ty: FieldType,
        description: Option<String>,
        deprecation: Option<String>,
    ) -> Self {
        Self {
            name,
            parent_type: parent_type.unwrap_or_else(|| "Query".to_string()),
            binding,
            params,
            ty,
            description,
            deprecation,
        }
    }
}

/// Whether a described type renders as `type` or `input` in SDL.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TypeKind {
    Object,
    Input,
}

/// One declared field of a described type.
#[derive(Clone, Debug)]
pub struct TypeFieldDescriptor {
    pub name: String,
    pub ty: FieldType,
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

#[buildstructor::buildstructor]
impl TypeFieldDescriptor {
    #[builder(visibility = "pub")]
    fn new(
        name: String,
        ty: FieldType,
        description: Option<String>,
        deprecation: Option<String>,
    ) -> Self {
        Self {
            name,
            ty,
            description,
            deprecation,
        }
    }
}

/// A described object or input type.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    pub description: Option<String>,
    pub fields: Vec<TypeFieldDescriptor>,
}

#[buildstructor::buildstructor]
impl TypeDescriptor {
    #[builder(visibility = "pub")]
    fn new(
        name: String,
        kind: Option<TypeKind>,
        description: Option<String>,
        fields: Vec<TypeFieldDescriptor>,
    ) -> Self {
        Self {
            name,
            kind: kind.unwrap_or(TypeKind::Object),
            description,
            fields,
        }
    }
}
