//! A lightweight GraphQL-flavoured query engine.
//!
//! Covers the subset of the query language most host applications need:
//! fields, aliases, arguments, variables and nested selections, resolved
//! against a schema built from declarative field and type descriptors.
//! Subscriptions run over the graphql-transport-ws WebSocket protocol.
//!
//! The engine is deliberately incomplete: no fragments, no introspection,
//! no directives. Hosts that outgrow it implement [`GraphqlEngine`] with a
//! full query-language stack and swap it in behind the same plug-point.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod execution;
pub mod graphql;
mod json_ext;
pub mod pipeline;
pub mod protocols;
pub mod spec;

pub use descriptor::FieldDescriptor;
pub use descriptor::ParamBinding;
pub use descriptor::ResolverBinding;
pub use descriptor::ResolverContext;
pub use descriptor::TypeDescriptor;
pub use descriptor::TypeFieldDescriptor;
pub use descriptor::TypeKind;
pub use engine::FeatherEngine;
pub use engine::GraphqlEngine;
pub use engine::StreamingHandle;
pub use error::FieldError;
pub use error::SchemaError;
pub use json_ext::Object;
pub use json_ext::Path;
pub use json_ext::Value;
pub use pipeline::FieldPipeline;
pub use spec::FieldType;
pub use spec::ScalarKind;
pub use spec::Schema;
pub use spec::SchemaDescriptors;
pub use spec::SpecError;
pub use spec::TypeRef;
