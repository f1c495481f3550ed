//! Exporting a built document back to its JSON description.
//!
//! Only what a type declares itself is written out: inherited fields and enum
//! values stay with the base they came from. References to other documents are
//! written with their namespace prefix, anonymous types inline.
use serde_json::Value;

use crate::data_type::{AdditionalFields, Field, TypeBody};
use crate::description::{DocumentDescription, ReferenceDescription};
use crate::document::{Document, TypeHandle};
use crate::schema::{
    AdditionalFieldsSchema, ComplexSchema, EnumMemberSchema, EnumSchema, FieldSchema, MappedSchema,
    SimpleSchema, TypeRef, TypeSchema, UnionSchema,
};

impl Document {
    pub fn describe(&self) -> DocumentDescription {
        let references = self
            .references()
            .filter(|(_, document)| !document.is_builtin())
            .map(|(namespace, document)| {
                let reference = match document.url() {
                    Some(url) => ReferenceDescription::Url(url.to_string()),
                    None => ReferenceDescription::Inline(Box::new(document.describe())),
                };
                (namespace.to_string(), reference)
            })
            .collect();
        let types = self
            .types()
            .filter_map(|(name, handle)| Some((name.to_string(), self.schema_of(handle)?)))
            .collect();
        DocumentDescription {
            url: self.url().map(str::to_string),
            info: self.info().clone(),
            references,
            types,
            no_builtin_types: !self.references().any(|(_, document)| document.is_builtin()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self.describe())
    }

    fn reference_to(&self, handle: TypeHandle) -> TypeRef {
        match self.qualified_name(handle) {
            Some(name) => TypeRef::Named(name),
            None => match self.schema_of(handle) {
                Some(schema) => TypeRef::Inline(Box::new(schema)),
                None => TypeRef::Named("any".to_string()),
            },
        }
    }

    /// The declarative schema of one type, without its name (the type map
    /// key carries it) and without anything inherited.
    fn schema_of(&self, handle: TypeHandle) -> Option<TypeSchema> {
        let data_type = self.data_type(handle)?;
        let description = data_type.description().map(str::to_string);
        let schema = match data_type.body() {
            TypeBody::Shell(_) => return None,
            TypeBody::Simple(simple) => TypeSchema::Simple(SimpleSchema {
                name: None,
                description,
                base: simple.base.map(|base| self.reference_to(base)),
                is_abstract: data_type.is_abstract(),
                constraints: simple.constraints.clone(),
                hooks: None,
            }),
            TypeBody::Complex(complex) => TypeSchema::Complex(ComplexSchema {
                name: None,
                description,
                base: complex.base.map(|base| self.reference_to(base)),
                is_abstract: data_type.is_abstract(),
                fields: complex
                    .own_fields(handle)
                    .map(|field| (field.name.clone(), self.field_schema(field)))
                    .collect(),
                additional_fields: match complex.additional_fields {
                    AdditionalFields::Deny => None,
                    AdditionalFields::Allow => Some(AdditionalFieldsSchema::Flag(true)),
                    AdditionalFields::Typed(ty) => Some(AdditionalFieldsSchema::Type(self.reference_to(ty))),
                },
            }),
            TypeBody::Enum(enumeration) => TypeSchema::Enum(EnumSchema {
                name: None,
                description,
                base: enumeration.base.map(|base| self.reference_to(base)),
                is_abstract: data_type.is_abstract(),
                values: enumeration
                    .values
                    .values()
                    .filter(|member| member.origin == handle)
                    .map(|member| EnumMemberSchema {
                        value: member.value.clone(),
                        alias: member.alias.clone(),
                        description: member.description.clone(),
                    })
                    .collect(),
            }),
            TypeBody::Union(union) => TypeSchema::Union(UnionSchema {
                name: None,
                description,
                types: union.types.iter().map(|member| self.reference_to(*member)).collect(),
            }),
            TypeBody::Mapped(mapped) => TypeSchema::Mapped(MappedSchema {
                name: None,
                description,
                source: self.reference_to(mapped.source),
                pick: mapped.pick.clone(),
                omit: mapped.omit.clone(),
                partial: mapped.partial.clone(),
            }),
        };
        Some(schema)
    }

    fn field_schema(&self, field: &Field) -> FieldSchema {
        FieldSchema {
            ty: Some(self.reference_to(field.ty)),
            design_type: None,
            is_array: field.is_array,
            required: field.required,
            exclusive: field.exclusive,
            enum_ref: field.enum_ref.map(|handle| self.reference_to(handle)),
            description: field.description.clone(),
            default: field.default.clone(),
            fixed: field.fixed.clone(),
            read_only: field.read_only,
            write_only: field.write_only,
            deprecated: field.deprecated,
        }
    }
}
