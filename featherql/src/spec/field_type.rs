use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

/// The closed set of scalars understood by the engine.
///
/// The scalar kind of a field is decided once, when its descriptor is
/// constructed; there is no runtime inspection of resolved values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Boolean,
    Id,
}

impl ScalarKind {
    pub(crate) const fn sdl_name(self) -> &'static str {
        match self {
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Id => "ID",
        }
    }
}

/// A reference to a scalar or a described object/input type.
///
/// `Lazy` wraps a thunk so that self-referential and mutually-referential
/// type graphs can be declared without caring about declaration order.
#[derive(Clone)]
pub enum TypeRef {
    Scalar(ScalarKind),
    Named(String),
    Lazy(Arc<dyn Fn() -> TypeRef + Send + Sync>),
}

/// Thunks are followed at most this many levels deep before giving up.
const THUNK_DEPTH_LIMIT: usize = 32;

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn lazy(thunk: impl Fn() -> TypeRef + Send + Sync + 'static) -> Self {
        TypeRef::Lazy(Arc::new(thunk))
    }

    /// Follows `Lazy` thunks until a concrete reference is reached.
    pub(crate) fn resolve(&self) -> TypeRef {
        let mut current = self.clone();
        for _ in 0..THUNK_DEPTH_LIMIT {
            match current {
                TypeRef::Lazy(thunk) => current = thunk(),
                concrete => return concrete,
            }
        }
        tracing::error!("type reference thunk did not converge; treating as String");
        TypeRef::Scalar(ScalarKind::String)
    }

    /// The name this reference renders as in SDL.
    pub(crate) fn sdl_name(&self) -> String {
        match self.resolve() {
            TypeRef::Scalar(kind) => kind.sdl_name().to_string(),
            TypeRef::Named(name) => name,
            TypeRef::Lazy(_) => unreachable!("resolve() never returns Lazy"),
        }
    }

    /// The described type name this reference points at, if any.
    pub(crate) fn named_type(&self) -> Option<String> {
        match self.resolve() {
            TypeRef::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Scalar(kind) => f.debug_tuple("Scalar").field(kind).finish(),
            TypeRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            TypeRef::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// The declared shape of a field: its type reference plus nullability and
/// list wrapping.
#[derive(Clone, Debug)]
pub struct FieldType {
    ty: TypeRef,
    nullable: bool,
    list: bool,
    item_nullable: bool,
}

impl FieldType {
    /// A non-null scalar field.
    pub fn scalar(kind: ScalarKind) -> Self {
        Self::reference(TypeRef::Scalar(kind))
    }

    /// A non-null reference to a described object/input type.
    pub fn object(name: impl Into<String>) -> Self {
        Self::reference(TypeRef::Named(name.into()))
    }

    /// A non-null field of the given type reference.
    pub fn reference(ty: TypeRef) -> Self {
        Self {
            ty,
            nullable: false,
            list: false,
            item_nullable: false,
        }
    }

    /// Marks the outer type as nullable, dropping the trailing `!`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Wraps the type in a list. Items default to non-null.
    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    /// Marks list items as nullable.
    pub fn nullable_items(mut self) -> Self {
        self.item_nullable = true;
        self
    }

    pub(crate) fn named_type(&self) -> Option<String> {
        self.ty.named_type()
    }

    /// Renders the SDL form, e.g. `String!`, `[User!]!` or `Int`.
    pub(crate) fn sdl(&self) -> String {
        let inner = self.ty.sdl_name();
        let mut rendered = if self.list {
            if self.item_nullable {
                format!("[{inner}]")
            } else {
                format!("[{inner}!]")
            }
        } else {
            inner
        };
        if !self.nullable {
            rendered.push('!');
        }
        rendered
    }
}
