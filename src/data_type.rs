//! Resolved data types.
//!
//! A [`DataType`] lives in its owning document's arena and is addressed by a
//! [`TypeHandle`]. Every reference between types (base, field type, union
//! member, mapped source) is a handle, so a slot can be pre-allocated as a
//! shell and filled in later without any referrer noticing.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::document::{DocumentId, TypeHandle};
use crate::schema::{EnumValue, Kind, PartialRule, SimpleConstraints};
use crate::thunk::{CodecHooks, SourceId};

#[derive(Debug, Clone)]
pub struct DataType {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) is_abstract: bool,
    pub(crate) source: Option<SourceId>,
    pub(crate) owner: DocumentId,
    pub(crate) body: TypeBody,
}

#[derive(Debug, Clone)]
pub enum TypeBody {
    /// Allocated and registered, not initialized yet.
    Shell(Kind),
    Simple(SimpleType),
    Complex(ComplexType),
    Enum(EnumType),
    Union(UnionType),
    Mapped(MappedType),
}

#[derive(Clone)]
pub struct SimpleType {
    pub base: Option<TypeHandle>,
    /// Own constraints only; inherited ones are layered by the codec.
    pub constraints: SimpleConstraints,
    pub hooks: Option<Arc<dyn CodecHooks>>,
}

#[derive(Debug, Clone)]
pub struct ComplexType {
    pub base: Option<TypeHandle>,
    /// Inherited fields first, then own fields in declaration order.
    pub fields: IndexMap<String, Field>,
    pub additional_fields: AdditionalFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditionalFields {
    Deny,
    Allow,
    Typed(TypeHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeHandle,
    /// The complex type that declared this field.
    pub origin: TypeHandle,
    pub is_array: bool,
    pub required: bool,
    pub exclusive: bool,
    pub enum_ref: Option<TypeHandle>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub fixed: Option<Value>,
    pub read_only: bool,
    pub write_only: bool,
    pub deprecated: bool,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub base: Option<TypeHandle>,
    /// Base members first; an own member with the same value replaces the inherited one.
    pub values: IndexMap<EnumValue, EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub value: EnumValue,
    pub alias: Option<String>,
    pub description: Option<String>,
    pub origin: TypeHandle,
}

#[derive(Debug, Clone)]
pub struct UnionType {
    pub types: Vec<TypeHandle>,
}

/// A projected view over a complex type; it has no fields of its own.
#[derive(Debug, Clone)]
pub struct MappedType {
    pub source: TypeHandle,
    pub pick: Option<Vec<String>>,
    pub omit: Option<Vec<String>>,
    pub partial: Option<PartialRule>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl DataType {
    pub(crate) fn shell(name: Option<String>, kind: Kind, owner: DocumentId) -> Self {
        Self {
            name,
            description: None,
            is_abstract: false,
            source: None,
            owner,
            body: TypeBody::Shell(kind),
        }
    }

    pub fn kind(&self) -> Kind {
        self.body.kind()
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }
    pub fn source(&self) -> Option<SourceId> {
        self.source
    }
    pub fn owner(&self) -> DocumentId {
        self.owner
    }
    pub fn body(&self) -> &TypeBody {
        &self.body
    }
    pub fn is_shell(&self) -> bool {
        matches!(self.body, TypeBody::Shell(_))
    }

    /// Declared base, for the kinds that have one.
    pub fn base(&self) -> Option<TypeHandle> {
        match &self.body {
            TypeBody::Simple(s) => s.base,
            TypeBody::Complex(c) => c.base,
            TypeBody::Enum(e) => e.base,
            _ => None,
        }
    }

    pub fn as_simple(&self) -> Option<&SimpleType> {
        match &self.body {
            TypeBody::Simple(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_complex(&self) -> Option<&ComplexType> {
        match &self.body {
            TypeBody::Complex(c) => Some(c),
            _ => None,
        }
    }
    pub fn as_enum(&self) -> Option<&EnumType> {
        match &self.body {
            TypeBody::Enum(e) => Some(e),
            _ => None,
        }
    }
    pub fn as_union(&self) -> Option<&UnionType> {
        match &self.body {
            TypeBody::Union(u) => Some(u),
            _ => None,
        }
    }
    pub fn as_mapped(&self) -> Option<&MappedType> {
        match &self.body {
            TypeBody::Mapped(m) => Some(m),
            _ => None,
        }
    }

    /// Name for messages; anonymous types render as their kind.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("<anonymous {}>", self.kind()),
        }
    }
}

impl TypeBody {
    pub fn kind(&self) -> Kind {
        match self {
            TypeBody::Shell(kind) => *kind,
            TypeBody::Simple(_) => Kind::Simple,
            TypeBody::Complex(_) => Kind::Complex,
            TypeBody::Enum(_) => Kind::Enum,
            TypeBody::Union(_) => Kind::Union,
            TypeBody::Mapped(_) => Kind::Mapped,
        }
    }
}

impl fmt::Debug for SimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleType")
            .field("base", &self.base)
            .field("constraints", &self.constraints)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

impl ComplexType {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Fields declared by the type itself, in declaration order.
    pub fn own_fields(&self, me: TypeHandle) -> impl Iterator<Item = &Field> {
        self.fields.values().filter(move |f| f.origin == me)
    }
}

impl MappedType {
    /// Apply the projection rule to the source's effective fields.
    pub fn project(&self, source_fields: Vec<Field>) -> Vec<Field> {
        source_fields
            .into_iter()
            .filter(|f| match (&self.pick, &self.omit) {
                (Some(pick), _) => pick.iter().any(|n| *n == f.name),
                (None, Some(omit)) => !omit.iter().any(|n| *n == f.name),
                (None, None) => true,
            })
            .map(|mut f| {
                if self.partial.as_ref().is_some_and(|rule| rule.covers(&f.name)) {
                    f.required = false;
                }
                f
            })
            .collect()
    }
}
