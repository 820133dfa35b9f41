//! Recursive-descent parser for the engine's query language.
//!
//! The grammar is a deliberately small subset of GraphQL: a single operation
//! per document, no fragments, no directives, no introspection. Constructs
//! outside the subset are rejected with an explicit diagnostic rather than
//! mis-parsed, so a lightweight engine never silently returns wrong results.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;

use crate::spec::ArgumentValue;
use crate::spec::Selection;
use crate::spec::SpecError;

/// Selection sets deeper than this fail with `RecursionLimitExceeded`
/// instead of overflowing the stack.
const RECURSION_LIMIT: usize = 128;

/// Field names carrying this prefix are reserved for introspection, which
/// this engine does not implement.
const INTROSPECTION_PREFIX: &str = "__";

/// The kind of a parsed operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Query => f.write_str("query"),
            OperationKind::Mutation => f.write_str("mutation"),
            OperationKind::Subscription => f.write_str("subscription"),
        }
    }
}

/// The root of a parsed document: one operation and its ordered top-level
/// selections.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub selections: Vec<Selection>,
}

impl Operation {
    /// Parses a document into an [`Operation`].
    pub fn parse(text: &str) -> Result<Self, SpecError> {
        Parser::new(text).parse_operation()
    }

    /// Re-serializes the selection tree, preserving field order, alias
    /// presence and argument values.
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.kind.to_string());
        if let Some(name) = &self.name {
            out.push(' ');
            out.push_str(name);
        }
        out.push_str(" { ");
        for (i, selection) in self.selections.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            selection.write_graphql(&mut out);
        }
        out.push_str(" }");
        out
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn parse_operation(&mut self) -> Result<Operation, SpecError> {
        self.skip_ignored();

        let mut kind = OperationKind::Query;
        let mut name = None;
        if self.peek().is_some_and(is_name_start) {
            let keyword_offset = self.pos;
            let keyword = self.parse_name()?;
            kind = match keyword.as_str() {
                "query" => OperationKind::Query,
                "mutation" => OperationKind::Mutation,
                "subscription" => OperationKind::Subscription,
                _ => {
                    return Err(self.error_at(
                        keyword_offset,
                        "'query', 'mutation' or 'subscription'",
                        format!("'{keyword}'"),
                    ));
                }
            };
            self.skip_ignored();
            if self.peek().is_some_and(is_name_start) {
                name = Some(self.parse_name()?);
                self.skip_ignored();
            }
            if self.peek() == Some(b'(') {
                // Variable definitions are accepted but not validated; the
                // executor resolves `$name` references against the supplied
                // variables map regardless of declared types.
                self.skip_variable_definitions()?;
                self.skip_ignored();
            }
        }

        self.expect(b'{')?;
        let selections = self.parse_selection_set(0)?;
        self.skip_ignored();
        if self.pos < self.text.len() {
            return Err(self.error("end of input"));
        }

        Ok(Operation {
            kind,
            name,
            selections,
        })
    }

    /// Parses the body of a brace-delimited selection set. The opening `{`
    /// has already been consumed.
    fn parse_selection_set(&mut self, depth: usize) -> Result<Vec<Selection>, SpecError> {
        if depth > RECURSION_LIMIT {
            return Err(SpecError::RecursionLimitExceeded);
        }

        let mut selections = Vec::new();
        loop {
            self.skip_ignored();
            match self.peek() {
                None => return Err(self.error("'}'")),
                Some(b'}') => {
                    if selections.is_empty() {
                        return Err(self.error("at least one field"));
                    }
                    self.bump();
                    return Ok(selections);
                }
                Some(b'.') => {
                    let offset = self.pos;
                    let construct = if self.rest().starts_with("...") {
                        self.pos += 3;
                        self.skip_ignored();
                        if self.rest().starts_with("on")
                            && !self.rest()[2..].starts_with(|c: char| is_name_continue(c as u8))
                        {
                            "inline fragment"
                        } else {
                            "fragment spread"
                        }
                    } else {
                        return Err(self.error("a field name"));
                    };
                    return Err(SpecError::UnsupportedConstruct {
                        construct: construct.to_string(),
                        offset,
                    });
                }
                Some(_) => selections.push(self.parse_selection(depth)?),
            }
        }
    }

    fn parse_selection(&mut self, depth: usize) -> Result<Selection, SpecError> {
        let start = self.pos;
        let first = self.parse_name()?;
        self.skip_ignored();

        let (alias, name) = if self.peek() == Some(b':') {
            self.bump();
            self.skip_ignored();
            (Some(first), self.parse_name()?)
        } else {
            (None, first)
        };

        if name.starts_with(INTROSPECTION_PREFIX) {
            return Err(SpecError::UnsupportedConstruct {
                construct: format!("introspection field '{name}'"),
                offset: start,
            });
        }

        self.skip_ignored();
        let arguments = if self.peek() == Some(b'(') {
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        self.skip_ignored();
        let selections = if self.peek() == Some(b'{') {
            self.bump();
            self.parse_selection_set(depth + 1)?
        } else {
            Vec::new()
        };

        Ok(Selection {
            name,
            alias,
            arguments,
            selections,
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<(String, ArgumentValue)>, SpecError> {
        self.expect(b'(')?;
        let mut arguments = Vec::new();
        loop {
            self.skip_ignored();
            match self.peek() {
                None => return Err(self.error("')'")),
                Some(b')') => {
                    if arguments.is_empty() {
                        return Err(self.error("an argument name"));
                    }
                    self.bump();
                    return Ok(arguments);
                }
                Some(_) => {
                    let name = self.parse_name()?;
                    self.skip_ignored();
                    self.expect(b':')?;
                    self.skip_ignored();
                    let value = self.parse_value(0)?;
                    arguments.push((name, value));
                }
            }
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<ArgumentValue, SpecError> {
        if depth > RECURSION_LIMIT {
            return Err(SpecError::RecursionLimitExceeded);
        }
        match self.peek() {
            Some(b'$') => {
                self.bump();
                Ok(ArgumentValue::Variable(self.parse_name()?))
            }
            Some(b'"') => Ok(ArgumentValue::String(self.parse_string()?)),
            Some(c) if c == b'-' || c.is_ascii_digit() => {
                Ok(ArgumentValue::Number(self.parse_number()?))
            }
            Some(b'{') => {
                self.bump();
                let mut fields = Vec::new();
                loop {
                    self.skip_ignored();
                    match self.peek() {
                        None => return Err(self.error("'}'")),
                        Some(b'}') => {
                            self.bump();
                            return Ok(ArgumentValue::Object(fields));
                        }
                        Some(_) => {
                            let name = self.parse_name()?;
                            self.skip_ignored();
                            self.expect(b':')?;
                            self.skip_ignored();
                            let value = self.parse_value(depth + 1)?;
                            fields.push((name, value));
                        }
                    }
                }
            }
            Some(b'[') => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_ignored();
                    match self.peek() {
                        None => return Err(self.error("']'")),
                        Some(b']') => {
                            self.bump();
                            return Ok(ArgumentValue::List(items));
                        }
                        Some(_) => items.push(self.parse_value(depth + 1)?),
                    }
                }
            }
            Some(c) if is_name_start(c) => {
                let offset = self.pos;
                let word = self.parse_name()?;
                match word.as_str() {
                    "true" => Ok(ArgumentValue::Boolean(true)),
                    "false" => Ok(ArgumentValue::Boolean(false)),
                    "null" => Ok(ArgumentValue::Null),
                    _ => Err(self.error_at(offset, "a value", format!("'{word}'"))),
                }
            }
            _ => Err(self.error("a value")),
        }
    }

    /// Parses a double-quoted string. Standard escapes are decoded; an
    /// unknown escape passes the escaped character through unchanged.
    fn parse_string(&mut self) -> Result<String, SpecError> {
        self.expect(b'"')?;
        let mut out = String::new();
        let mut chars = self.text[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += offset + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    None => break,
                    Some((_, escaped)) => out.push(match escaped {
                        '"' => '"',
                        '\\' => '\\',
                        '/' => '/',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        'b' => '\u{0008}',
                        'f' => '\u{000C}',
                        other => other,
                    }),
                },
                c => out.push(c),
            }
        }
        self.pos = self.text.len();
        Err(self.error("'\"'"))
    }

    /// Parses a numeric literal: optional leading `-`, digits, optional
    /// single decimal point. No exponent notation.
    fn parse_number(&mut self) -> Result<Number, SpecError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.bump();
        }
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == digits_start {
            return Err(self.error("a digit"));
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.bump();
            let fraction_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            if self.pos == fraction_start {
                return Err(self.error("a digit"));
            }
        }

        let literal = &self.text[start..self.pos];
        let number = if is_float {
            literal
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
        } else {
            literal
                .parse::<i64>()
                .ok()
                .map(Number::from)
                .or_else(|| literal.parse::<f64>().ok().and_then(Number::from_f64))
        };
        number.ok_or_else(|| self.error_at(start, "a representable number", format!("'{literal}'")))
    }

    fn parse_name(&mut self) -> Result<String, SpecError> {
        let start = self.pos;
        if !self.peek().is_some_and(is_name_start) {
            return Err(self.error("a name"));
        }
        while self.peek().is_some_and(is_name_continue) {
            self.bump();
        }
        Ok(self.text[start..self.pos].to_string())
    }

    /// Skips the parenthesized variable-definition block without validating
    /// it. Strings and comments inside the block are skimmed so that
    /// parentheses within them do not unbalance the scan.
    fn skip_variable_definitions(&mut self) -> Result<(), SpecError> {
        self.expect(b'(')?;
        let mut parens = 1usize;
        while parens > 0 {
            match self.peek() {
                None => return Err(self.error("')'")),
                Some(b'(') => {
                    parens += 1;
                    self.bump();
                }
                Some(b')') => {
                    parens -= 1;
                    self.bump();
                }
                Some(b'"') => {
                    self.parse_string()?;
                }
                Some(b'#') => self.skip_comment(),
                Some(_) => self.bump(),
            }
        }
        Ok(())
    }

    /// Whitespace, commas and `#` comments are all insignificant.
    fn skip_ignored(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n' | b',') => self.bump(),
                Some(b'#') => self.skip_comment(),
                _ => return,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            self.bump();
            if c == b'\n' {
                return;
            }
        }
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, expected: u8) -> Result<(), SpecError> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("'{}'", expected as char)))
        }
    }

    fn error(&self, expected: &str) -> SpecError {
        let found = match self.text[self.pos..].chars().next() {
            Some(c) => format!("'{c}'"),
            None => "end of input".to_string(),
        };
        self.error_at(self.pos, expected, found)
    }

    fn error_at(&self, offset: usize, expected: &str, found: String) -> SpecError {
        SpecError::Syntax {
            offset,
            expected: expected.to_string(),
            found,
        }
    }
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_name_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}
