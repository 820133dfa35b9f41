use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use crate::descriptor::FieldDescriptor;
use crate::descriptor::ParamBinding;
use crate::descriptor::TypeDescriptor;
use crate::descriptor::TypeKind;
use crate::error::SchemaError;
use crate::spec::OperationKind;

/// The descriptor sources a schema is built from.
#[derive(Clone, Debug, Default)]
pub struct SchemaDescriptors {
    pub queries: Vec<FieldDescriptor>,
    pub mutations: Vec<FieldDescriptor>,
    pub subscriptions: Vec<FieldDescriptor>,
    pub types: Vec<TypeDescriptor>,
}

#[buildstructor::buildstructor]
impl SchemaDescriptors {
    /// Returns a builder that builds [`SchemaDescriptors`].
    ///
    /// Builder methods: `.query(..)`, `.mutation(..)`, `.subscription(..)`
    /// and `.type_descriptor(..)` each repeatable, plus the plural `Vec`
    /// setters.
    #[builder(visibility = "pub")]
    fn new(
        queries: Vec<FieldDescriptor>,
        mutations: Vec<FieldDescriptor>,
        subscriptions: Vec<FieldDescriptor>,
        type_descriptors: Vec<TypeDescriptor>,
    ) -> Self {
        Self {
            queries,
            mutations,
            subscriptions,
            types: type_descriptors,
        }
    }
}

/// A resolved schema: the three root resolver maps, the described types
/// reachable from them, and the rendered SDL.
///
/// Built once and read-only afterward; rebuilding replaces the whole value,
/// so concurrent in-flight executions always see a consistent snapshot.
#[derive(Debug)]
pub struct Schema {
    sdl: String,
    queries: HashMap<String, FieldDescriptor>,
    mutations: HashMap<String, FieldDescriptor>,
    subscriptions: HashMap<String, FieldDescriptor>,
    type_fields: HashMap<String, TypeDescriptor>,
}

impl Schema {
    /// Builds the schema: collects the root maps, discovers transitively
    /// referenced types to a fixed point, and renders the SDL.
    pub fn build(descriptors: &SchemaDescriptors) -> Result<Schema, SchemaError> {
        let (queries, query_order) = collect_root("Query", &descriptors.queries);
        let (mutations, mutation_order) = collect_root("Mutation", &descriptors.mutations);
        let (subscriptions, subscription_order) =
            collect_root("Subscription", &descriptors.subscriptions);

        if queries.is_empty() && mutations.is_empty() && subscriptions.is_empty() {
            return Err(SchemaError::NoRegisteredFields);
        }

        let mut types_by_name: HashMap<&str, &TypeDescriptor> = HashMap::new();
        for descriptor in &descriptors.types {
            if types_by_name
                .insert(descriptor.name.as_str(), descriptor)
                .is_some()
            {
                tracing::warn!(
                    r#type = %descriptor.name,
                    "duplicate type descriptor, keeping the latest registration"
                );
            }
        }

        // Fixed-point discovery. The visited set only grows and the universe
        // of described types is finite, so this terminates; a type reached
        // twice is a no-op, which keeps self-referential and
        // mutually-referential graphs safe.
        let mut queue: VecDeque<String> = VecDeque::new();
        for field in descriptors
            .queries
            .iter()
            .chain(&descriptors.mutations)
            .chain(&descriptors.subscriptions)
        {
            queue.extend(referenced_types(field));
        }
        let mut visited: HashSet<String> = HashSet::new();
        let mut discovered: Vec<String> = Vec::new();
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            match types_by_name.get(name.as_str()) {
                Some(descriptor) => {
                    discovered.push(name);
                    for field in &descriptor.fields {
                        if let Some(nested) = field.ty.named_type() {
                            queue.push_back(nested);
                        }
                    }
                }
                None => {
                    tracing::debug!(
                        r#type = %name,
                        "referenced type is not described, assuming an externally defined scalar"
                    );
                }
            }
        }

        let mut sdl = String::new();
        for name in &discovered {
            if let Some(descriptor) = types_by_name.get(name.as_str()) {
                render_type(&mut sdl, descriptor);
            }
        }
        render_root(&mut sdl, "Query", &query_order, &queries);
        render_root(&mut sdl, "Mutation", &mutation_order, &mutations);
        render_root(&mut sdl, "Subscription", &subscription_order, &subscriptions);

        let type_fields = discovered
            .iter()
            .filter_map(|name| {
                types_by_name
                    .get(name.as_str())
                    .map(|descriptor| (name.clone(), (*descriptor).clone()))
            })
            .collect();

        Ok(Schema {
            sdl,
            queries,
            mutations,
            subscriptions,
            type_fields,
        })
    }

    /// The textual schema definition, for documentation and tooling.
    pub fn sdl(&self) -> &str {
        &self.sdl
    }

    /// Looks up the resolver descriptor registered for a root field.
    pub fn resolver(&self, kind: OperationKind, name: &str) -> Option<&FieldDescriptor> {
        match kind {
            OperationKind::Query => self.queries.get(name),
            OperationKind::Mutation => self.mutations.get(name),
            OperationKind::Subscription => self.subscriptions.get(name),
        }
    }

    /// Looks up a described type that was discovered during the build.
    pub fn type_fields(&self, name: &str) -> Option<&TypeDescriptor> {
        self.type_fields.get(name)
    }
}

/// Collects one root's fields into its map, preserving registration order.
/// A duplicate name silently overwrites the earlier registration (matching
/// repeated re-application of a descriptor) but is logged for conformance.
fn collect_root(
    root: &str,
    fields: &[FieldDescriptor],
) -> (HashMap<String, FieldDescriptor>, Vec<String>) {
    let mut map = HashMap::new();
    let mut order = Vec::new();
    for field in fields {
        if map.insert(field.name.clone(), field.clone()).is_some() {
            tracing::warn!(
                root,
                field = %field.name,
                "duplicate field registration, keeping the latest"
            );
        } else {
            order.push(field.name.clone());
        }
    }
    (map, order)
}

/// The described type names a root field refers to: its return type, its
/// named argument types, and the (SDL-skipped) argument-bag input type.
fn referenced_types(field: &FieldDescriptor) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(name) = field.ty.named_type() {
        names.push(name);
    }
    for param in &field.params {
        match param {
            ParamBinding::Arg { ty, .. } => {
                if let Some(name) = ty.named_type() {
                    names.push(name);
                }
            }
            ParamBinding::ArgBag { input: Some(ty) } => {
                if let Some(name) = ty.named_type() {
                    names.push(name);
                }
            }
            ParamBinding::ArgBag { input: None } | ParamBinding::Context => {}
        }
    }
    names
}

fn render_description(out: &mut String, description: Option<&str>, indent: &str) {
    if let Some(description) = description {
        out.push_str(indent);
        out.push_str("\"\"\"\n");
        for line in description.lines() {
            out.push_str(indent);
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(indent);
        out.push_str("\"\"\"\n");
    }
}

fn render_deprecation(out: &mut String, deprecation: Option<&str>) {
    if let Some(reason) = deprecation {
        out.push_str(" @deprecated(reason: \"");
        out.push_str(&reason.replace('"', "\\\""));
        out.push_str("\")");
    }
}

fn render_type(out: &mut String, descriptor: &TypeDescriptor) {
    if !out.is_empty() {
        out.push('\n');
    }
    render_description(out, descriptor.description.as_deref(), "");
    let keyword = match descriptor.kind {
        TypeKind::Object => "type",
        TypeKind::Input => "input",
    };
    out.push_str(keyword);
    out.push(' ');
    out.push_str(&descriptor.name);
    out.push_str(" {\n");
    for field in &descriptor.fields {
        render_description(out, field.description.as_deref(), "  ");
        out.push_str("  ");
        out.push_str(&field.name);
        out.push_str(": ");
        out.push_str(&field.ty.sdl());
        render_deprecation(out, field.deprecation.as_deref());
        out.push('\n');
    }
    out.push_str("}\n");
}

/// Renders a root type block, but only if at least one field was registered
/// for that root.
fn render_root(
    out: &mut String,
    root: &str,
    order: &[String],
    fields: &HashMap<String, FieldDescriptor>,
) {
    if fields.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str("type ");
    out.push_str(root);
    out.push_str(" {\n");
    for name in order {
        let Some(field) = fields.get(name) else {
            continue;
        };
        render_description(out, field.description.as_deref(), "  ");
        out.push_str("  ");
        out.push_str(&field.name);
        let arguments: Vec<String> = field
            .params
            .iter()
            .filter_map(|param| match param {
                ParamBinding::Arg { name, ty } => Some(format!("{name}: {}", ty.sdl())),
                // The argument-bag input shape is knowingly skipped here.
                ParamBinding::ArgBag { .. } | ParamBinding::Context => None,
            })
            .collect();
        if !arguments.is_empty() {
            out.push('(');
            out.push_str(&arguments.join(", "));
            out.push(')');
        }
        out.push_str(": ");
        out.push_str(&field.ty.sdl());
        render_deprecation(out, field.deprecation.as_deref());
        out.push('\n');
    }
    out.push_str("}\n");
}
