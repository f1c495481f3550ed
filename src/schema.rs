//! Declarative type schemas.
//!
//! A [`TypeSchema`] is the raw, unlinked shape a type source declares. It is a
//! closed variant keyed by `kind`, so a malformed declaration is rejected once,
//! at import time, by [`TypeSchema::validate`] instead of deep inside a kind
//! initializer.
//!
//! References between schemas are [`TypeRef`]s: a name, an inline schema, or
//! (only before import) a [`Thunk`].
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::design_type::{DesignType, HasDesignType};
use crate::error::ErrorKind;
use crate::thunk::{CodecHooks, Thunk, TypeSource};

// ————————————————————————————————————————————————————————————————————————————
// KINDS & REFERENCES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "SimpleType")]
    Simple,
    #[serde(rename = "ComplexType")]
    Complex,
    #[serde(rename = "EnumType")]
    Enum,
    #[serde(rename = "UnionType")]
    Union,
    #[serde(rename = "MappedType")]
    Mapped,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Simple => "SimpleType",
            Kind::Complex => "ComplexType",
            Kind::Enum => "EnumType",
            Kind::Union => "UnionType",
            Kind::Mapped => "MappedType",
        })
    }
}

/// Reference to another type from inside a schema.
///
/// After import every reference is either `Named` or `Inline`; `Thunk` only
/// exists in schemas that have not been through the importer yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Named(String),
    Inline(Box<TypeSchema>),
    #[serde(skip)]
    Thunk(Thunk),
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Named(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Named(name)
    }
}

impl From<Thunk> for TypeRef {
    fn from(thunk: Thunk) -> Self {
        TypeRef::Thunk(thunk)
    }
}

impl From<Arc<TypeSource>> for TypeRef {
    fn from(source: Arc<TypeSource>) -> Self {
        TypeRef::Thunk(Thunk::Source(source))
    }
}

impl From<TypeSchema> for TypeRef {
    fn from(schema: TypeSchema) -> Self {
        TypeRef::Inline(Box::new(schema))
    }
}

/// Codec hooks carried by a simple schema once its source has been imported.
#[derive(Clone)]
pub struct SharedHooks(pub Arc<dyn CodecHooks>);

impl fmt::Debug for SharedHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedHooks(..)")
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA VARIANTS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TypeSchema {
    #[serde(rename = "SimpleType")]
    Simple(SimpleSchema),
    #[serde(rename = "ComplexType")]
    Complex(ComplexSchema),
    #[serde(rename = "EnumType")]
    Enum(EnumSchema),
    #[serde(rename = "UnionType")]
    Union(UnionSchema),
    #[serde(rename = "MappedType")]
    Mapped(MappedSchema),
}

/// Declarative constraints of a simple type. They are layered along the base
/// chain when a codec is generated, never merged at resolve time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl SimpleConstraints {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<TypeRef>,
    #[serde(default, rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(flatten)]
    pub constraints: SimpleConstraints,
    #[serde(skip)]
    pub hooks: Option<SharedHooks>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<TypeRef>,
    #[serde(default, rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(default)]
    pub fields: IndexMap<String, FieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_fields: Option<AdditionalFieldsSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalFieldsSchema {
    Flag(bool),
    Type(TypeRef),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeRef>,
    /// Rust-side type the field was declared with; consulted only when `ty` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_type: Option<DesignType>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_array: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclusive: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_ref: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub write_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
}

/// Enum member value. Integers are tried before floats so `1` stays an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    Integer(i64),
    Number(OrderedFloat<f64>),
    String(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "EnumMemberRepr")]
pub struct EnumMemberSchema {
    pub value: EnumValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnumMemberRepr {
    Bare(EnumValue),
    Full {
        value: EnumValue,
        #[serde(default)]
        alias: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<EnumMemberRepr> for EnumMemberSchema {
    fn from(repr: EnumMemberRepr) -> Self {
        match repr {
            EnumMemberRepr::Bare(value) => Self { value, alias: None, description: None },
            EnumMemberRepr::Full { value, alias, description } => Self { value, alias, description },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<TypeRef>,
    #[serde(default, rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(default)]
    pub values: Vec<EnumMemberSchema>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeRef>,
}

/// `partial: true` relaxes every field, a list relaxes only the named ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartialRule {
    All(bool),
    Fields(Vec<String>),
}

impl PartialRule {
    pub fn covers(&self, field: &str) -> bool {
        match self {
            PartialRule::All(all) => *all,
            PartialRule::Fields(names) => names.iter().any(|n| n == field),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub source: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omit: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialRule>,
}

pub(crate) fn is_false(flag: &bool) -> bool {
    !*flag
}

// ————————————————————————————————————————————————————————————————————————————
// COMMON ACCESSORS & VALIDATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeSchema {
    pub fn kind(&self) -> Kind {
        match self {
            TypeSchema::Simple(_) => Kind::Simple,
            TypeSchema::Complex(_) => Kind::Complex,
            TypeSchema::Enum(_) => Kind::Enum,
            TypeSchema::Union(_) => Kind::Union,
            TypeSchema::Mapped(_) => Kind::Mapped,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            TypeSchema::Simple(s) => s.name.as_deref(),
            TypeSchema::Complex(s) => s.name.as_deref(),
            TypeSchema::Enum(s) => s.name.as_deref(),
            TypeSchema::Union(s) => s.name.as_deref(),
            TypeSchema::Mapped(s) => s.name.as_deref(),
        }
    }

    pub fn set_name(&mut self, name: Option<String>) {
        match self {
            TypeSchema::Simple(s) => s.name = name,
            TypeSchema::Complex(s) => s.name = name,
            TypeSchema::Enum(s) => s.name = name,
            TypeSchema::Union(s) => s.name = name,
            TypeSchema::Mapped(s) => s.name = name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            TypeSchema::Simple(s) => s.description.as_deref(),
            TypeSchema::Complex(s) => s.description.as_deref(),
            TypeSchema::Enum(s) => s.description.as_deref(),
            TypeSchema::Union(s) => s.description.as_deref(),
            TypeSchema::Mapped(s) => s.description.as_deref(),
        }
    }

    /// Declared base; unions and mapped types never have one.
    pub fn base(&self) -> Option<&TypeRef> {
        match self {
            TypeSchema::Simple(s) => s.base.as_ref(),
            TypeSchema::Complex(s) => s.base.as_ref(),
            TypeSchema::Enum(s) => s.base.as_ref(),
            TypeSchema::Union(_) | TypeSchema::Mapped(_) => None,
        }
    }

    /// Structural validation of a single schema, independent of any other type.
    pub fn validate(&self) -> Result<(), ErrorKind> {
        if let Some(name) = self.name() {
            validate_type_name(name)?;
        }
        match self {
            TypeSchema::Simple(s) => s.constraints.validate(),
            TypeSchema::Complex(s) => {
                if s.fields.keys().any(|name| name.trim().is_empty()) {
                    return Err(ErrorKind::invalid("field names must not be empty"));
                }
                Ok(())
            }
            TypeSchema::Enum(s) => {
                if s.values.is_empty() && s.base.is_none() {
                    return Err(ErrorKind::invalid("enum type declares no values"));
                }
                let mut seen = std::collections::HashSet::new();
                for member in &s.values {
                    if !seen.insert(&member.value) {
                        return Err(ErrorKind::invalid(format!(
                            "enum value {} is declared more than once",
                            member.value
                        )));
                    }
                }
                Ok(())
            }
            TypeSchema::Union(s) => {
                if s.types.is_empty() {
                    return Err(ErrorKind::invalid("union type declares no member types"));
                }
                Ok(())
            }
            TypeSchema::Mapped(s) => {
                if s.pick.is_some() && s.omit.is_some() {
                    return Err(ErrorKind::invalid(
                        "mapped type cannot declare both `pick` and `omit`",
                    ));
                }
                Ok(())
            }
        }
    }
}

pub(crate) fn validate_type_name(name: &str) -> Result<(), ErrorKind> {
    if name.trim().is_empty() {
        return Err(ErrorKind::invalid("type names must not be empty"));
    }
    if name.contains(':') {
        return Err(ErrorKind::invalid(format!(
            "type name \"{name}\" must not contain ':' (reserved for namespaces)"
        )));
    }
    Ok(())
}

impl SimpleConstraints {
    fn validate(&self) -> Result<(), ErrorKind> {
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(ErrorKind::invalid(format!("minValue {min} exceeds maxValue {max}")));
            }
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(ErrorKind::invalid(format!("minLength {min} exceeds maxLength {max}")));
            }
        }
        if let Some(pattern) = &self.pattern {
            regex::Regex::new(pattern)
                .map_err(|error| ErrorKind::invalid(format!("pattern {pattern:?} does not compile: {error}")))?;
        }
        Ok(())
    }
}

impl EnumValue {
    pub fn to_json(&self) -> Value {
        match self {
            EnumValue::Integer(i) => Value::from(*i),
            EnumValue::Number(n) => Value::from(n.0),
            EnumValue::String(s) => Value::from(s.clone()),
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(EnumValue::String(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(EnumValue::Integer(i)),
                None => n.as_f64().map(|f| EnumValue::Number(OrderedFloat(f))),
            },
            _ => None,
        }
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumValue::Integer(i) => write!(f, "{i}"),
            EnumValue::Number(n) => write!(f, "{}", n.0),
            EnumValue::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for EnumValue {
    fn from(value: &str) -> Self {
        EnumValue::String(value.to_string())
    }
}

impl From<i64> for EnumValue {
    fn from(value: i64) -> Self {
        EnumValue::Integer(value)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDERS
// ————————————————————————————————————————————————————————————————————————————

impl SimpleSchema {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }
    pub fn extends(mut self, base: impl Into<TypeRef>) -> Self {
        self.base = Some(base.into());
        self
    }
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.constraints.min_value = min;
        self.constraints.max_value = max;
        self
    }
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.constraints.min_length = min;
        self.constraints.max_length = max;
        self
    }
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }
}

impl ComplexSchema {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }
    pub fn extends(mut self, base: impl Into<TypeRef>) -> Self {
        self.base = Some(base.into());
        self
    }
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
    pub fn field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        self.fields.insert(name.into(), field);
        self
    }
    pub fn additional_fields(mut self, policy: AdditionalFieldsSchema) -> Self {
        self.additional_fields = Some(policy);
        self
    }
}

impl FieldSchema {
    pub fn of(ty: impl Into<TypeRef>) -> Self {
        Self { ty: Some(ty.into()), ..Self::default() }
    }
    /// Field typed by its Rust type through the design-type table.
    pub fn typed<T: HasDesignType + ?Sized>() -> Self {
        Self { design_type: Some(T::DESIGN_TYPE), ..Self::default() }
    }
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
    pub fn with_enum(mut self, enum_ref: impl Into<TypeRef>) -> Self {
        self.enum_ref = Some(enum_ref.into());
        self
    }
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
    pub fn fixed(mut self, value: Value) -> Self {
        self.fixed = Some(value);
        self
    }
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }
}

impl EnumSchema {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }
    pub fn extends(mut self, base: impl Into<TypeRef>) -> Self {
        self.base = Some(base.into());
        self
    }
    pub fn value(mut self, value: impl Into<EnumValue>) -> Self {
        self.values.push(EnumMemberSchema { value: value.into(), alias: None, description: None });
        self
    }
    pub fn aliased(mut self, value: impl Into<EnumValue>, alias: impl Into<String>) -> Self {
        self.values.push(EnumMemberSchema {
            value: value.into(),
            alias: Some(alias.into()),
            description: None,
        });
        self
    }
}

impl UnionSchema {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }
    pub fn member(mut self, ty: impl Into<TypeRef>) -> Self {
        self.types.push(ty.into());
        self
    }
}

impl MappedSchema {
    pub fn over(source: impl Into<TypeRef>) -> Self {
        Self {
            name: None,
            description: None,
            source: source.into(),
            pick: None,
            omit: None,
            partial: None,
        }
    }
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn pick<I: IntoIterator<Item = S>, S: Into<String>>(mut self, fields: I) -> Self {
        self.pick = Some(fields.into_iter().map(Into::into).collect());
        self
    }
    pub fn omit<I: IntoIterator<Item = S>, S: Into<String>>(mut self, fields: I) -> Self {
        self.omit = Some(fields.into_iter().map(Into::into).collect());
        self
    }
    pub fn partial(mut self, rule: PartialRule) -> Self {
        self.partial = Some(rule);
        self
    }
}

macro_rules! schema_conversions {
    ($($schema:ident => $variant:ident),+ $(,)?) => {
        $(
            impl From<$schema> for TypeSchema {
                fn from(schema: $schema) -> Self {
                    TypeSchema::$variant(schema)
                }
            }
            impl From<$schema> for TypeRef {
                fn from(schema: $schema) -> Self {
                    TypeRef::Inline(Box::new(TypeSchema::$variant(schema)))
                }
            }
            impl From<$schema> for Thunk {
                fn from(schema: $schema) -> Self {
                    Thunk::Schema(Box::new(TypeSchema::$variant(schema)))
                }
            }
        )+
    };
}

schema_conversions! {
    SimpleSchema => Simple,
    ComplexSchema => Complex,
    EnumSchema => Enum,
    UnionSchema => Union,
    MappedSchema => Mapped,
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
