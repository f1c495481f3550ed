//! Codec generation.
//!
//! A [`Codec`] walks a JSON value against a resolved data type and produces
//! the decoded (or encoded) value, collecting every problem as an [`Issue`]
//! instead of stopping at the first one. Projections choose which fields take
//! part: `name` picks, `+name` adds an exclusive field to the defaults,
//! `-name` drops a field, and `address.city` projects inside a nested object.
use std::collections::{HashMap, HashSet};
use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::data_type::{AdditionalFields, DataType, Field, TypeBody, UnionType};
use crate::document::{Document, TypeHandle};
use crate::error::{ErrorKind, Result};
use crate::schema::{EnumValue, SimpleConstraints};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Decode,
    Encode,
}

/// How `required` is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Partiality {
    #[default]
    Strict,
    /// Top-level fields may be missing.
    Shallow,
    /// Fields may be missing at any depth.
    Deep,
}

#[derive(Debug, Clone, Default)]
pub struct CodecOptions {
    pub direction: Direction,
    pub projection: Vec<String>,
    pub partial: Partiality,
    /// Skip `readOnly` fields, as when decoding a request body.
    pub ignore_read_only: bool,
    /// Skip `writeOnly` fields, as when encoding a response.
    pub ignore_write_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// JSON-pointer style location; empty for the root value.
    pub location: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_issues(issues))]
pub struct CodecError {
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Default)]
struct Projection {
    pick: HashSet<String>,
    include: HashSet<String>,
    exclude: HashSet<String>,
    nested: HashMap<String, Projection>,
}

pub struct Codec<'d> {
    document: &'d Document,
    root: TypeHandle,
    options: CodecOptions,
    projection: Option<Projection>,
    patterns: HashMap<String, Regex>,
}

// ————————————————————————————————————————————————————————————————————————————
// PUBLIC API
// ————————————————————————————————————————————————————————————————————————————

impl CodecOptions {
    pub fn decode() -> Self {
        Self::default()
    }
    pub fn encode() -> Self {
        Self { direction: Direction::Encode, ..Self::default() }
    }
    pub fn project<I: IntoIterator<Item = S>, S: Into<String>>(mut self, entries: I) -> Self {
        self.projection = entries.into_iter().map(Into::into).collect();
        self
    }
    pub fn partial(mut self, partial: Partiality) -> Self {
        self.partial = partial;
        self
    }
    pub fn ignore_read_only(mut self) -> Self {
        self.ignore_read_only = true;
        self
    }
    pub fn ignore_write_only(mut self) -> Self {
        self.ignore_write_only = true;
        self
    }
}

impl Document {
    pub fn codec(&self, handle: TypeHandle, options: CodecOptions) -> Result<Codec<'_>> {
        Codec::generate(self, handle, options)
    }

    pub fn codec_for(&self, name: &str, options: CodecOptions) -> Result<Codec<'_>> {
        let handle = self
            .get(name)
            .ok_or_else(|| ErrorKind::UnresolvedReference { name: name.to_string() })?;
        self.codec(handle, options)
    }
}

impl<'d> Codec<'d> {
    fn generate(document: &'d Document, root: TypeHandle, options: CodecOptions) -> Result<Self> {
        let patterns = compile_patterns(document, root)?;
        let projection = Projection::parse(&options.projection);
        if let (Some(projection), Some(fields)) = (&projection, document.fields_of(root)) {
            for name in projection.names() {
                if !fields.iter().any(|field| field.name == name) {
                    warn!(field = name, "projection names a field the type does not have");
                }
            }
        }
        trace!(patterns = patterns.len(), "codec generated");
        Ok(Self { document, root, options, projection, patterns })
    }

    pub fn root(&self) -> TypeHandle {
        self.root
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub fn apply(&self, value: &Value) -> Result<Value, CodecError> {
        let mut issues = Vec::new();
        let output = self.walk(self.root, value, "", self.projection.as_ref(), self.options.partial, &mut issues);
        match output {
            Some(output) if issues.is_empty() => Ok(output),
            _ => Err(CodecError { issues }),
        }
    }
}

impl Issue {
    fn new(location: &str, message: impl Into<String>) -> Self {
        Self { location: location.to_string(), message: message.into() }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = if self.location.is_empty() { "/" } else { &self.location };
        write!(f, "{location}: {}", self.message)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// WALK
// ————————————————————————————————————————————————————————————————————————————

type Issues = Vec<Issue>;

impl Codec<'_> {
    fn decoding(&self) -> bool {
        self.options.direction == Direction::Decode
    }

    fn walk(
        &self,
        handle: TypeHandle,
        value: &Value,
        at: &str,
        projection: Option<&Projection>,
        partial: Partiality,
        issues: &mut Issues,
    ) -> Option<Value> {
        let Some(data_type) = self.document.data_type(handle) else {
            issues.push(Issue::new(at, "type is not visible from this document"));
            return None;
        };
        match data_type.body() {
            TypeBody::Simple(_) => self.simple(handle, value, at, issues),
            TypeBody::Complex(complex) => {
                let fields: Vec<&Field> = complex.fields.values().collect();
                self.object(&fields, complex.additional_fields, value, at, projection, partial, issues)
            }
            TypeBody::Mapped(mapped) => {
                let projected = self.document.fields_of(handle).unwrap_or_default();
                let fields: Vec<&Field> = projected.iter().collect();
                let additional = self
                    .document
                    .data_type(mapped.source)
                    .and_then(DataType::as_complex)
                    .map_or(AdditionalFields::Deny, |source| source.additional_fields);
                self.object(&fields, additional, value, at, projection, partial, issues)
            }
            TypeBody::Enum(_) => self.enumeration(handle, value, at, issues),
            TypeBody::Union(union) => self.union(union, value, at, projection, partial, issues),
            TypeBody::Shell(_) => {
                issues.push(Issue::new(at, format!("{} is not resolved", data_type.display_name())));
                None
            }
        }
    }

    /// Hooks come from the nearest type in the base chain that has them;
    /// constraints of every type in the chain apply.
    fn simple(&self, handle: TypeHandle, value: &Value, at: &str, issues: &mut Issues) -> Option<Value> {
        let chain: Vec<_> = self
            .document
            .base_chain(handle)
            .into_iter()
            .filter_map(|h| self.document.data_type(h).and_then(DataType::as_simple))
            .collect();
        let mut output = value.clone();
        if let Some(hooks) = chain.iter().find_map(|simple| simple.hooks.as_ref()) {
            let result = match self.options.direction {
                Direction::Decode => hooks.decode(value),
                Direction::Encode => hooks.encode(value),
            };
            match result {
                Ok(converted) => output = converted,
                Err(message) => {
                    issues.push(Issue::new(at, message));
                    return None;
                }
            }
        }
        let before = issues.len();
        for simple in &chain {
            self.check_constraints(&simple.constraints, &output, at, issues);
        }
        (issues.len() == before).then_some(output)
    }

    fn check_constraints(&self, constraints: &SimpleConstraints, value: &Value, at: &str, issues: &mut Issues) {
        if let Some(n) = value.as_f64() {
            if let Some(min) = constraints.min_value.filter(|min| n < *min) {
                issues.push(Issue::new(at, format!("must be at least {min}")));
            }
            if let Some(max) = constraints.max_value.filter(|max| n > *max) {
                issues.push(Issue::new(at, format!("must be at most {max}")));
            }
        }
        let length = match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        };
        if let Some(length) = length {
            if let Some(min) = constraints.min_length.filter(|min| length < *min) {
                issues.push(Issue::new(at, format!("must be at least {min} long")));
            }
            if let Some(max) = constraints.max_length.filter(|max| length > *max) {
                issues.push(Issue::new(at, format!("must be at most {max} long")));
            }
        }
        if let (Some(pattern), Value::String(s)) = (&constraints.pattern, value) {
            if self.patterns.get(pattern).is_some_and(|re| !re.is_match(s)) {
                issues.push(Issue::new(at, format!("must match {pattern}")));
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn object(
        &self,
        fields: &[&Field],
        additional: AdditionalFields,
        value: &Value,
        at: &str,
        projection: Option<&Projection>,
        partial: Partiality,
        issues: &mut Issues,
    ) -> Option<Value> {
        let Value::Object(input) = value else {
            issues.push(Issue::new(at, "must be an object"));
            return None;
        };
        let before = issues.len();
        let nested_partial = match partial {
            Partiality::Deep => Partiality::Deep,
            Partiality::Strict | Partiality::Shallow => Partiality::Strict,
        };
        let mut output = Map::new();

        for field in fields {
            let admitted = match projection {
                Some(projection) => projection.admits(field),
                None => !field.exclusive,
            };
            let hidden = (field.read_only && self.options.ignore_read_only)
                || (field.write_only && self.options.ignore_write_only);
            if !admitted || hidden {
                continue;
            }
            let location = format!("{at}/{}", field.name);
            match input.get(&field.name) {
                None | Some(Value::Null) => {
                    if let (Some(fixed), true) = (&field.fixed, self.decoding()) {
                        output.insert(field.name.clone(), fixed.clone());
                    } else if let (Some(default), true) = (&field.default, self.decoding()) {
                        output.insert(field.name.clone(), default.clone());
                    } else if field.required && partial == Partiality::Strict {
                        issues.push(Issue::new(&location, "is required"));
                    } else if input.contains_key(&field.name) {
                        output.insert(field.name.clone(), Value::Null);
                    }
                }
                Some(present) => {
                    if let Some(fixed) = field.fixed.as_ref().filter(|fixed| *fixed != present) {
                        issues.push(Issue::new(&location, format!("must be {fixed}")));
                        continue;
                    }
                    let nested = projection.and_then(|p| p.nested.get(&field.name));
                    if let Some(converted) = self.field(field, present, &location, nested, nested_partial, issues) {
                        output.insert(field.name.clone(), converted);
                    }
                }
            }
        }

        for (key, extra) in input {
            if fields.iter().any(|field| field.name == *key) {
                continue;
            }
            let location = format!("{at}/{key}");
            match additional {
                AdditionalFields::Deny if self.decoding() => {
                    issues.push(Issue::new(&location, "is not a known field"));
                }
                AdditionalFields::Deny => {}
                AdditionalFields::Allow => {
                    output.insert(key.clone(), extra.clone());
                }
                AdditionalFields::Typed(ty) => {
                    if let Some(converted) = self.walk(ty, extra, &location, None, nested_partial, issues) {
                        output.insert(key.clone(), converted);
                    }
                }
            }
        }

        (issues.len() == before).then_some(Value::Object(output))
    }

    fn field(
        &self,
        field: &Field,
        value: &Value,
        at: &str,
        projection: Option<&Projection>,
        partial: Partiality,
        issues: &mut Issues,
    ) -> Option<Value> {
        if !field.is_array {
            return self.field_item(field, value, at, projection, partial, issues);
        }
        let Value::Array(items) = value else {
            issues.push(Issue::new(at, "must be an array"));
            return None;
        };
        let before = issues.len();
        let converted: Vec<Value> = items
            .iter()
            .enumerate()
            .filter_map(|(ix, item)| {
                self.field_item(field, item, &format!("{at}/{ix}"), projection, partial, issues)
            })
            .collect();
        (issues.len() == before).then_some(Value::Array(converted))
    }

    fn field_item(
        &self,
        field: &Field,
        value: &Value,
        at: &str,
        projection: Option<&Projection>,
        partial: Partiality,
        issues: &mut Issues,
    ) -> Option<Value> {
        let converted = self.walk(field.ty, value, at, projection, partial, issues)?;
        match field.enum_ref {
            Some(enum_ref) => self.enumeration(enum_ref, &converted, at, issues),
            None => Some(converted),
        }
    }

    /// Values pass through; on decode an alias is replaced by its value.
    fn enumeration(&self, handle: TypeHandle, value: &Value, at: &str, issues: &mut Issues) -> Option<Value> {
        let Some(enumeration) = self.document.data_type(handle).and_then(DataType::as_enum) else {
            issues.push(Issue::new(at, "enum type is not resolved"));
            return None;
        };
        if let Some(key) = EnumValue::from_json(value) {
            if enumeration.values.contains_key(&key) {
                return Some(value.clone());
            }
        }
        if let (Value::String(s), true) = (value, self.decoding()) {
            let aliased = enumeration.values.values().find(|m| m.alias.as_deref() == Some(s.as_str()));
            if let Some(member) = aliased {
                return Some(member.value.to_json());
            }
        }
        let allowed = enumeration.values.keys().map(ToString::to_string).collect::<Vec<_>>();
        issues.push(Issue::new(at, format!("must be one of {}", allowed.join(", "))));
        None
    }

    /// The first member that accepts the value wins.
    fn union(
        &self,
        union: &UnionType,
        value: &Value,
        at: &str,
        projection: Option<&Projection>,
        partial: Partiality,
        issues: &mut Issues,
    ) -> Option<Value> {
        for member in &union.types {
            let mut attempt = Vec::new();
            if let Some(converted) = self.walk(*member, value, at, projection, partial, &mut attempt) {
                if attempt.is_empty() {
                    return Some(converted);
                }
            }
        }
        let names = union
            .types
            .iter()
            .map(|h| self.document.qualified_name(*h).unwrap_or_else(|| "<anonymous>".to_string()))
            .collect::<Vec<_>>();
        issues.push(Issue::new(at, format!("does not match any of {}", names.join(" | "))));
        None
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

impl Projection {
    fn parse(entries: &[String]) -> Option<Projection> {
        if entries.is_empty() {
            return None;
        }
        let mut projection = Projection::default();
        for entry in entries {
            projection.add(entry.trim());
        }
        Some(projection)
    }

    fn add(&mut self, entry: &str) {
        let (sign, rest) = match entry.strip_prefix('+') {
            Some(rest) => ("+", rest),
            None => match entry.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", entry),
            },
        };
        match rest.split_once('.') {
            Some((head, tail)) => {
                match sign {
                    "+" => self.include.insert(head.to_string()),
                    "" => self.pick.insert(head.to_string()),
                    _ => false,
                };
                self.nested.entry(head.to_string()).or_default().add(&format!("{sign}{tail}"));
            }
            None => {
                let set = match sign {
                    "+" => &mut self.include,
                    "-" => &mut self.exclude,
                    _ => &mut self.pick,
                };
                set.insert(rest.to_string());
            }
        }
    }

    fn admits(&self, field: &Field) -> bool {
        if self.exclude.contains(&field.name) {
            return false;
        }
        if self.include.contains(&field.name) {
            return true;
        }
        if !self.pick.is_empty() {
            return self.pick.contains(&field.name);
        }
        !field.exclusive
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.pick
            .iter()
            .chain(&self.include)
            .chain(&self.exclude)
            .map(String::as_str)
    }
}

/// Compile every pattern reachable from `root` once, up front.
fn compile_patterns(document: &Document, root: TypeHandle) -> Result<HashMap<String, Regex>> {
    let mut patterns = HashMap::new();
    let mut seen = HashSet::new();
    let mut pending = vec![root];
    while let Some(handle) = pending.pop() {
        if !seen.insert(handle) {
            continue;
        }
        let data_type = document
            .data_type(handle)
            .ok_or_else(|| ErrorKind::invalid("codec root is not visible from this document"))?;
        match data_type.body() {
            TypeBody::Simple(simple) => {
                if let Some(pattern) = &simple.constraints.pattern {
                    if !patterns.contains_key(pattern) {
                        let re = Regex::new(pattern).map_err(|error| {
                            ErrorKind::invalid(format!("pattern {pattern:?} does not compile: {error}"))
                        })?;
                        patterns.insert(pattern.clone(), re);
                    }
                }
                pending.extend(simple.base);
            }
            TypeBody::Complex(complex) => {
                pending.extend(complex.base);
                for field in complex.fields.values() {
                    pending.push(field.ty);
                    pending.extend(field.enum_ref);
                }
                if let AdditionalFields::Typed(ty) = complex.additional_fields {
                    pending.push(ty);
                }
            }
            TypeBody::Enum(enumeration) => pending.extend(enumeration.base),
            TypeBody::Union(union) => pending.extend(union.types.iter().copied()),
            TypeBody::Mapped(mapped) => pending.push(mapped.source),
            TypeBody::Shell(_) => {
                return Err(ErrorKind::invalid(format!("{} is not resolved", data_type.display_name())).into());
            }
        }
    }
    Ok(patterns)
}

fn render_issues(issues: &[Issue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
