use serde_json::Number;

/// A literal or variable reference appearing in argument position.
///
/// Numbers carry no integer/float distinction at parse time; the executor
/// and the host decide representation.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgumentValue {
    String(String),
    Number(Number),
    Boolean(bool),
    Null,
    /// A `$name` reference, resolved against the request variables at
    /// execution time. An unresolved reference is a programming error in the
    /// caller, never silently executed.
    Variable(String),
    Object(Vec<(String, ArgumentValue)>),
    List(Vec<ArgumentValue>),
}

impl ArgumentValue {
    pub(crate) fn write_graphql(&self, out: &mut String) {
        match self {
            ArgumentValue::String(s) => {
                out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\t' => out.push_str("\\t"),
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            ArgumentValue::Number(n) => out.push_str(&n.to_string()),
            ArgumentValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            ArgumentValue::Null => out.push_str("null"),
            ArgumentValue::Variable(name) => {
                out.push('$');
                out.push_str(name);
            }
            ArgumentValue::Object(fields) => {
                out.push('{');
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    out.push_str(": ");
                    value.write_graphql(out);
                }
                out.push('}');
            }
            ArgumentValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_graphql(out);
                }
                out.push(']');
            }
        }
    }
}

/// One requested field: name, optional alias, arguments and nested
/// selections (empty for scalar leaves).
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<(String, ArgumentValue)>,
    pub selections: Vec<Selection>,
}

impl Selection {
    /// The key this selection occupies in the response `data`: the alias if
    /// present, else the field name. Never both.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn write_graphql(&self, out: &mut String) {
        if let Some(alias) = &self.alias {
            out.push_str(alias);
            out.push_str(": ");
        }
        out.push_str(&self.name);
        if !self.arguments.is_empty() {
            out.push('(');
            for (i, (name, value)) in self.arguments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push_str(": ");
                value.write_graphql(out);
            }
            out.push(')');
        }
        if !self.selections.is_empty() {
            out.push_str(" { ");
            for (i, selection) in self.selections.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                selection.write_graphql(out);
            }
            out.push_str(" }");
        }
    }
}
