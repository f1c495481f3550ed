//! Import phase: thunks in, linked schemas in the queue out.
use std::sync::Arc;

use tracing::{debug, trace};

use super::queue::QueuedType;
use super::{CachedImport, DocumentBuilder, TypeDefinitions};
use crate::error::{DocumentError, ErrorKind, Result};
use crate::schema::{AdditionalFieldsSchema, FieldSchema, SharedHooks, TypeRef, TypeSchema};
use crate::thunk::{SourceId, Thunk, TypeSource};

impl DocumentBuilder<'_, '_> {
    pub(super) fn import_definitions(&mut self, definitions: TypeDefinitions) -> Result<()> {
        match definitions {
            TypeDefinitions::List(thunks) => {
                for thunk in thunks {
                    self.import_top_level(None, thunk)?;
                }
            }
            TypeDefinitions::Map(thunks) => {
                for (key, thunk) in thunks {
                    self.import_top_level(Some(key), thunk)?;
                }
            }
        }
        debug!(queued = self.queue.len(), "import finished");
        Ok(())
    }

    fn import_top_level(&mut self, key: Option<String>, thunk: Thunk) -> Result<()> {
        let thunk = match thunk.force() {
            Ok(thunk) => thunk,
            Err(kind) => {
                let error = DocumentError::from(kind);
                return Err(match &key {
                    Some(key) => error.at_type(key).at_section("Types"),
                    None => error.at_section("Types"),
                });
            }
        };
        let label = key.clone().unwrap_or_else(|| label_of(&thunk));
        self.import_keyed(key, thunk)
            .map_err(|error| error.at_type(&label).at_section("Types"))
    }

    fn import_keyed(&mut self, key: Option<String>, thunk: Thunk) -> Result<()> {
        let thunk = match (&key, thunk) {
            (Some(key), Thunk::Schema(mut schema)) => {
                if schema.name().is_none() {
                    schema.set_name(Some(key.clone()));
                }
                Thunk::Schema(schema)
            }
            (_, thunk) => thunk,
        };
        if let Thunk::Name(name) = &thunk {
            if !self.queue.contains(name) && self.document.get(name).is_none() {
                return Err(ErrorKind::UnresolvedReference { name: name.clone() }.into());
            }
        }
        match self.import_thunk(&thunk)? {
            TypeRef::Named(name) => match key {
                Some(key) if key != name => Err(ErrorKind::invalid(format!(
                    "type declared under \"{key}\" is named \"{name}\""
                ))
                .into()),
                _ => Ok(()),
            },
            _ => Err(ErrorKind::invalid("top-level types must be named").into()),
        }
    }

    /// Import whatever `thunk` stands for and return how to refer to it.
    pub(super) fn import_thunk(&mut self, thunk: &Thunk) -> Result<TypeRef> {
        match thunk.force()? {
            Thunk::Name(name) => Ok(TypeRef::Named(name)),
            Thunk::Schema(schema) => self.import_schema(*schema, None),
            Thunk::Source(source) => self.import_source(&source),
            Thunk::Deferred(_) => Err(ErrorKind::invalid("deferred thunk did not settle").into()),
        }
    }

    fn import_source(&mut self, source: &Arc<TypeSource>) -> Result<TypeRef> {
        if let Some(cached) = self.ctx.cache.get(&source.id()).cloned() {
            if let Some(imported) = self.cached_ref(cached) {
                trace!(source = source.label(), "source served from build cache");
                return Ok(imported);
            }
        }
        if let Some(handle) = self.document.find_by_source(source.id()) {
            if let Some(name) = self.document.qualified_name(handle) {
                trace!(source = source.label(), %name, "source found in a referenced document");
                return Ok(TypeRef::Named(name));
            }
        }

        let Some(metadata) = source.metadata() else {
            return Err(ErrorKind::MissingMetadata {
                what: format!("type source \"{}\"", source.label()),
            }
            .into());
        };
        let mut schema = metadata.clone();
        if let (TypeSchema::Simple(simple), Some(hooks)) = (&mut schema, source.hooks()) {
            if simple.hooks.is_none() {
                simple.hooks = Some(SharedHooks(hooks.clone()));
            }
        }

        match schema.name().map(str::to_string) {
            Some(name) => {
                // cached before linking so a field pointing back at the source finds it
                self.ctx.cache.insert(
                    source.id(),
                    CachedImport::Named { document: self.document.id(), name },
                );
                self.import_schema(schema, Some(source.id()))
            }
            None => self.import_anonymous_source(source, schema),
        }
    }

    fn import_anonymous_source(&mut self, source: &TypeSource, schema: TypeSchema) -> Result<TypeRef> {
        let id = source.id();
        if !self.importing.insert(id) {
            return Err(ErrorKind::invalid(format!(
                "anonymous type source \"{}\" refers to itself; give it a name",
                source.label()
            ))
            .into());
        }
        let result = self.import_schema(schema, Some(id));
        self.importing.remove(&id);
        let imported = result?;
        if let TypeRef::Inline(linked) = &imported {
            self.ctx.cache.insert(id, CachedImport::Inline(linked.clone()));
        }
        Ok(imported)
    }

    /// A cache entry left by another document's build only counts when that
    /// document is visible from this one.
    fn cached_ref(&self, cached: CachedImport) -> Option<TypeRef> {
        match cached {
            CachedImport::Inline(schema) => Some(TypeRef::Inline(schema)),
            CachedImport::Named { document, name } if document == self.document.id() => {
                Some(TypeRef::Named(name))
            }
            CachedImport::Named { document, name } => {
                let owner = self
                    .document
                    .references()
                    .find_map(|(_, doc)| doc.find_document(document))?;
                let handle = owner.get_own(&name)?;
                self.document.qualified_name(handle).map(TypeRef::Named)
            }
        }
    }

    fn import_schema(&mut self, schema: TypeSchema, source: Option<SourceId>) -> Result<TypeRef> {
        schema.validate()?;
        let name = schema.name().map(str::to_string);
        if let Some(name) = &name {
            if self.document.get_own(name).is_some() || self.queue.contains(name) {
                return Err(ErrorKind::DuplicateTypeName { name: name.clone() }.into());
            }
            debug!(%name, kind = %schema.kind(), "queued type");
            self.queue.insert(name.clone(), QueuedType { schema: schema.clone(), source });
        }
        let linked = self.link(schema)?;
        match name {
            Some(name) => {
                self.queue.replace_schema(&name, linked);
                Ok(TypeRef::Named(name))
            }
            None => Ok(TypeRef::Inline(Box::new(linked))),
        }
    }

    /// Import every type the schema depends on and replace the references
    /// with names or linked inline schemas.
    fn link(&mut self, schema: TypeSchema) -> Result<TypeSchema> {
        Ok(match schema {
            TypeSchema::Simple(mut s) => {
                s.base = self.link_optional(s.base)?;
                TypeSchema::Simple(s)
            }
            TypeSchema::Complex(mut c) => {
                c.base = self.link_optional(c.base)?;
                for (name, field) in std::mem::take(&mut c.fields) {
                    let field = self.link_field(field).map_err(|error| error.at_field(&name))?;
                    c.fields.insert(name, field);
                }
                c.additional_fields = match c.additional_fields.take() {
                    Some(AdditionalFieldsSchema::Type(ty)) => {
                        Some(AdditionalFieldsSchema::Type(self.link_ref(ty)?))
                    }
                    flag => flag,
                };
                TypeSchema::Complex(c)
            }
            TypeSchema::Enum(mut e) => {
                e.base = self.link_optional(e.base)?;
                TypeSchema::Enum(e)
            }
            TypeSchema::Union(mut u) => {
                u.types = std::mem::take(&mut u.types)
                    .into_iter()
                    .map(|member| self.link_ref(member))
                    .collect::<Result<_>>()?;
                TypeSchema::Union(u)
            }
            TypeSchema::Mapped(mut m) => {
                let source = std::mem::replace(&mut m.source, TypeRef::Named(String::new()));
                m.source = self.link_ref(source)?;
                TypeSchema::Mapped(m)
            }
        })
    }

    fn link_field(&mut self, mut field: FieldSchema) -> Result<FieldSchema> {
        let declared = match (field.ty.take(), field.design_type) {
            (Some(ty), _) => ty,
            (None, Some(design_type)) => {
                let name = self.ctx.factory.design_types.get(design_type).ok_or_else(|| {
                    ErrorKind::invalid(format!("no data type is registered for design type {design_type:?}"))
                })?;
                TypeRef::Named(name.to_string())
            }
            (None, None) => TypeRef::Named("any".to_string()),
        };
        field.ty = Some(self.link_ref(declared)?);
        field.enum_ref = self.link_optional(field.enum_ref.take())?;
        Ok(field)
    }

    fn link_optional(&mut self, ty: Option<TypeRef>) -> Result<Option<TypeRef>> {
        ty.map(|ty| self.link_ref(ty)).transpose()
    }

    fn link_ref(&mut self, ty: TypeRef) -> Result<TypeRef> {
        match ty {
            TypeRef::Named(name) => Ok(TypeRef::Named(name)),
            TypeRef::Inline(schema) => self.import_schema(*schema, None),
            TypeRef::Thunk(thunk) => self.import_thunk(&thunk),
        }
    }
}

fn label_of(thunk: &Thunk) -> String {
    match thunk {
        Thunk::Name(name) => name.clone(),
        Thunk::Source(source) => source.label().to_string(),
        Thunk::Schema(schema) => schema.name().unwrap_or("<anonymous>").to_string(),
        Thunk::Deferred(_) => "<deferred>".to_string(),
    }
}
