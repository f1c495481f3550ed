//! Kind initializers and the finalize pass.
//!
//! Each initializer fills a pre-allocated shell in place. Bases, union
//! members and mapped sources arrive already resolved; complex fields are
//! attached afterwards by [`DocumentBuilder::attach_fields`], one at a time.
use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;

use super::DocumentBuilder;
use crate::data_type::{
    AdditionalFields, ComplexType, DataType, EnumMember, EnumType, Field, MappedType, SimpleType,
    TypeBody, UnionType,
};
use crate::document::{Document, TypeHandle};
use crate::error::{DocumentError, ErrorKind, Result};
use crate::schema::{
    AdditionalFieldsSchema, ComplexSchema, EnumSchema, FieldSchema, Kind, MappedSchema,
    SimpleSchema, UnionSchema,
};

// ————————————————————————————————————————————————————————————————————————————
// KIND INITIALIZERS
// ————————————————————————————————————————————————————————————————————————————

impl DocumentBuilder<'_, '_> {
    pub(super) fn init_simple(
        &mut self,
        handle: TypeHandle,
        schema: SimpleSchema,
        base: Option<TypeHandle>,
    ) -> Result<()> {
        if let Some(base) = base {
            self.expect_kind(base, || format!("base of {}", self.name_of(handle)), &[Kind::Simple])?;
        }
        let slot = self.slot(handle)?;
        slot.description = schema.description;
        slot.is_abstract = schema.is_abstract;
        slot.body = TypeBody::Simple(SimpleType {
            base,
            constraints: schema.constraints,
            hooks: schema.hooks.map(|hooks| hooks.0),
        });
        Ok(())
    }

    /// Set up a complex type with its inherited fields only; own fields are
    /// attached by [`Self::attach_fields`] once the queue entry is gone.
    pub(super) fn init_complex(
        &mut self,
        handle: TypeHandle,
        schema: &ComplexSchema,
        base: Option<TypeHandle>,
    ) -> Result<()> {
        let mut fields = IndexMap::new();
        let mut additional_fields = AdditionalFields::Deny;
        if let Some(base) = base {
            self.expect_kind(
                base,
                || format!("base of {}", self.name_of(handle)),
                &[Kind::Complex, Kind::Mapped],
            )?;
            for field in self.document.fields_of(base).unwrap_or_default() {
                if !schema.fields.contains_key(&field.name) {
                    fields.insert(field.name.clone(), field);
                }
            }
            additional_fields = additional_fields_of(&self.document, base);
        }
        match schema.additional_fields {
            Some(AdditionalFieldsSchema::Flag(true)) => additional_fields = AdditionalFields::Allow,
            Some(AdditionalFieldsSchema::Flag(false)) => additional_fields = AdditionalFields::Deny,
            // typed policies are resolved together with the fields
            Some(AdditionalFieldsSchema::Type(_)) | None => {}
        }

        let slot = self.slot(handle)?;
        slot.description = schema.description.clone();
        slot.is_abstract = schema.is_abstract;
        slot.body = TypeBody::Complex(ComplexType { base, fields, additional_fields });
        Ok(())
    }

    /// Resolve and attach own fields. Each field starts a fresh base path:
    /// pointing back at a type whose base is still resolving is legal here.
    pub(super) fn attach_fields(&mut self, handle: TypeHandle, schema: ComplexSchema) -> Result<()> {
        let saved = self.guard.suspend();
        let result = self.attach_fields_unguarded(handle, schema);
        self.guard.restore(saved);
        result
    }

    fn attach_fields_unguarded(&mut self, handle: TypeHandle, schema: ComplexSchema) -> Result<()> {
        for (name, field) in schema.fields {
            let field = self
                .resolve_field(handle, &name, field)
                .map_err(|error| error.at_field(&name))?;
            if let TypeBody::Complex(complex) = &mut self.slot(handle)?.body {
                // an override moves to the subtype's declaration position
                complex.fields.shift_remove(&name);
                complex.fields.insert(name, field);
            }
        }
        if let Some(AdditionalFieldsSchema::Type(ty)) = &schema.additional_fields {
            let ty = self.resolve_ref(ty)?;
            if let TypeBody::Complex(complex) = &mut self.slot(handle)?.body {
                complex.additional_fields = AdditionalFields::Typed(ty);
            }
        }
        Ok(())
    }

    fn resolve_field(&mut self, owner: TypeHandle, name: &str, field: FieldSchema) -> Result<Field> {
        let declared = field
            .ty
            .as_ref()
            .ok_or_else(|| ErrorKind::invalid("field has no type"))?;
        let ty = self.resolve_ref(declared)?;
        let enum_ref = match &field.enum_ref {
            Some(enum_ref) => {
                let enum_ref = self.resolve_ref(enum_ref)?;
                self.expect_kind(enum_ref, || format!("enum of field {name}"), &[Kind::Enum])?;
                Some(enum_ref)
            }
            None => None,
        };
        trace!(field = name, ty = %self.name_of(ty), "attached field");
        Ok(Field {
            name: name.to_string(),
            ty,
            origin: owner,
            is_array: field.is_array,
            required: field.required,
            exclusive: field.exclusive,
            enum_ref,
            description: field.description,
            default: field.default,
            fixed: field.fixed,
            read_only: field.read_only,
            write_only: field.write_only,
            deprecated: field.deprecated,
        })
    }

    pub(super) fn init_enum(
        &mut self,
        handle: TypeHandle,
        schema: EnumSchema,
        base: Option<TypeHandle>,
    ) -> Result<()> {
        let mut values = IndexMap::new();
        if let Some(base) = base {
            self.expect_kind(base, || format!("base of {}", self.name_of(handle)), &[Kind::Enum])?;
            if let Some(inherited) = self.document.data_type(base).and_then(DataType::as_enum) {
                values = inherited.values.clone();
            }
        }
        for member in schema.values {
            let value = member.value.clone();
            values.insert(
                value,
                EnumMember {
                    value: member.value,
                    alias: member.alias,
                    description: member.description,
                    origin: handle,
                },
            );
        }
        let slot = self.slot(handle)?;
        slot.description = schema.description;
        slot.is_abstract = schema.is_abstract;
        slot.body = TypeBody::Enum(EnumType { base, values });
        Ok(())
    }

    pub(super) fn init_union(
        &mut self,
        handle: TypeHandle,
        schema: UnionSchema,
        members: Vec<TypeHandle>,
    ) -> Result<()> {
        let mut types = Vec::with_capacity(members.len());
        for member in members {
            if member == handle {
                return Err(ErrorKind::invalid("a union type cannot contain itself").into());
            }
            if !types.contains(&member) {
                types.push(member);
            }
        }
        let slot = self.slot(handle)?;
        slot.description = schema.description;
        slot.body = TypeBody::Union(UnionType { types });
        Ok(())
    }

    pub(super) fn init_mapped(
        &mut self,
        handle: TypeHandle,
        schema: MappedSchema,
        source: TypeHandle,
    ) -> Result<()> {
        self.expect_kind(
            source,
            || format!("type mapped by {}", self.name_of(handle)),
            &[Kind::Complex],
        )?;
        let slot = self.slot(handle)?;
        slot.description = schema.description;
        slot.body = TypeBody::Mapped(MappedType {
            source,
            pick: schema.pick,
            omit: schema.omit,
            partial: schema.partial,
        });
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FINALIZE
// ————————————————————————————————————————————————————————————————————————————

impl DocumentBuilder<'_, '_> {
    /// Check that nothing was left half-built, refresh inherited fields that
    /// were copied from a base before the base had its own fields, and index
    /// the finished document.
    pub(super) fn finish(mut self) -> Result<Document> {
        if let Some(name) = self.queue.next_name() {
            return Err(DocumentError::from(ErrorKind::invalid("type was queued but never resolved"))
                .at_type(&name)
                .at_section("Types"));
        }
        for handle in self.document.own_handles() {
            if let Some(data_type) = self.document.data_type(handle).filter(|dt| dt.is_shell()) {
                let name = data_type.display_name();
                return Err(DocumentError::from(ErrorKind::invalid("type was never initialized"))
                    .at_type(&name)
                    .at_section("Types"));
            }
        }

        let mut merged = HashSet::new();
        for handle in self.document.own_handles() {
            self.merge_inherited(handle, &mut merged);
        }
        check_union_cycles(&self.document)?;

        self.document.invalidate();
        Ok(self.document)
    }

    /// Recompute the inherited part of a complex type's fields, bases first.
    fn merge_inherited(&mut self, handle: TypeHandle, merged: &mut HashSet<TypeHandle>) {
        if handle.document() != self.document.id() || !merged.insert(handle) {
            return;
        }
        let base = match self.document.data_type(handle).map(DataType::body) {
            Some(TypeBody::Complex(complex)) => complex.base,
            Some(TypeBody::Mapped(mapped)) => {
                let source = mapped.source;
                self.merge_inherited(source, merged);
                return;
            }
            _ => return,
        };
        let Some(base) = base else { return };
        self.merge_inherited(base, merged);

        let inherited = self.document.fields_of(base).unwrap_or_default();
        let Some(TypeBody::Complex(complex)) = self.document.slot_mut(handle).map(|dt| &mut dt.body) else {
            return;
        };
        let own: Vec<Field> = complex.own_fields(handle).cloned().collect();
        let mut fields: IndexMap<String, Field> = inherited
            .into_iter()
            .filter(|field| !own.iter().any(|o| o.name == field.name))
            .map(|field| (field.name.clone(), field))
            .collect();
        fields.extend(own.into_iter().map(|field| (field.name.clone(), field)));
        complex.fields = fields;
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

impl DocumentBuilder<'_, '_> {
    fn slot(&mut self, handle: TypeHandle) -> Result<&mut DataType> {
        self.document
            .slot_mut(handle)
            .ok_or_else(|| ErrorKind::invalid("type does not belong to the document being built").into())
    }

    fn name_of(&self, handle: TypeHandle) -> String {
        match self.document.qualified_name(handle) {
            Some(name) => name,
            None => self
                .document
                .data_type(handle)
                .map(DataType::display_name)
                .unwrap_or_else(|| "<unknown>".to_string()),
        }
    }

    fn expect_kind(
        &self,
        handle: TypeHandle,
        subject: impl FnOnce() -> String,
        expected: &[Kind],
    ) -> Result<()> {
        let found = self
            .document
            .data_type(handle)
            .map(DataType::kind)
            .ok_or_else(|| ErrorKind::invalid("reference to a type outside this document"))?;
        if expected.contains(&found) {
            return Ok(());
        }
        Err(ErrorKind::TypeMismatch {
            subject: subject(),
            expected: expected.iter().map(ToString::to_string).collect::<Vec<_>>().join(" or "),
            found: format!("{found} {}", self.name_of(handle)),
        }
        .into())
    }
}

fn additional_fields_of(document: &Document, handle: TypeHandle) -> AdditionalFields {
    match document.data_type(handle).map(DataType::body) {
        Some(TypeBody::Complex(complex)) => complex.additional_fields,
        Some(TypeBody::Mapped(mapped)) => additional_fields_of(document, mapped.source),
        _ => AdditionalFields::Deny,
    }
}

/// Unions may nest, but not through themselves.
fn check_union_cycles(document: &Document) -> Result<()> {
    fn visit(
        document: &Document,
        handle: TypeHandle,
        stack: &mut Vec<TypeHandle>,
        done: &mut HashSet<TypeHandle>,
    ) -> Result<()> {
        if done.contains(&handle) {
            return Ok(());
        }
        if let Some(start) = stack.iter().position(|h| *h == handle) {
            let chain = stack[start..]
                .iter()
                .chain(std::iter::once(&handle))
                .map(|h| document.qualified_name(*h).unwrap_or_else(|| "<anonymous>".into()))
                .collect::<Vec<_>>();
            return Err(ErrorKind::invalid(format!(
                "union types contain each other: {}",
                chain.join(" -> ")
            ))
            .into());
        }
        let Some(union) = document.data_type(handle).and_then(DataType::as_union) else {
            return Ok(());
        };
        stack.push(handle);
        for member in &union.types {
            visit(document, *member, stack, done)?;
        }
        stack.pop();
        done.insert(handle);
        Ok(())
    }

    let mut done = HashSet::new();
    for handle in document.own_handles() {
        visit(document, handle, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}
