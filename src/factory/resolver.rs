//! Resolve phase: shells, the drain loop and reference resolution.
use tracing::{debug, trace};

use super::DocumentBuilder;
use crate::data_type::DataType;
use crate::document::TypeHandle;
use crate::error::{ErrorKind, Result};
use crate::schema::{Kind, TypeRef, TypeSchema};

impl DocumentBuilder<'_, '_> {
    /// Allocate and register an uninitialized slot for every queued name, so
    /// any reference to it resolves to a stable handle from now on.
    pub(super) fn allocate_shells(&mut self) {
        let owner = self.document.id();
        let shells: Vec<_> = self
            .queue
            .iter()
            .map(|(name, entry)| {
                let mut shell = DataType::shell(Some(name.to_string()), entry.schema.kind(), owner);
                shell.source = entry.source;
                (name.to_string(), shell)
            })
            .collect();
        for (name, shell) in shells {
            let handle = self.document.allocate(shell);
            self.document.register(&name, handle);
        }
        debug!(shells = self.document.len(), "allocated shells");
    }

    pub(super) fn drain(&mut self) -> Result<()> {
        while let Some(name) = self.queue.next_name() {
            self.resolve_named(&name)
                .map_err(|error| error.at_type(&name).at_section("Types"))?;
        }
        Ok(())
    }

    pub(super) fn resolve_ref(&mut self, ty: &TypeRef) -> Result<TypeHandle> {
        match ty {
            TypeRef::Named(name) => self.resolve_named(name),
            TypeRef::Inline(schema) => self.resolve_inline(schema),
            TypeRef::Thunk(_) => Err(ErrorKind::invalid("type reference was never imported").into()),
        }
    }

    /// A name outside the queue is final (or a shell being filled further up
    /// the stack) and is returned as is.
    fn resolve_named(&mut self, name: &str) -> Result<TypeHandle> {
        let Some(handle) = self.document.get_own(name) else {
            return self
                .document
                .get(name)
                .ok_or_else(|| ErrorKind::UnresolvedReference { name: name.to_string() }.into());
        };
        let Some(kind) = self.queue.kind_of(name) else {
            return Ok(handle);
        };
        match kind {
            Kind::Union => {
                if let Some(entry) = self.queue.take(name) {
                    trace!(name, %kind, "resolving derived type");
                    self.initialize_derived(handle, entry.schema)?;
                }
            }
            kind => {
                if self.guard.contains(name) {
                    return Err(ErrorKind::CircularBaseReference {
                        chain: self.guard.chain_through(name),
                    }
                    .into());
                }
                trace!(name, %kind, "resolving type");
                self.guard.enter(name);
                let result = if kind == Kind::Mapped {
                    self.resolve_mapped(name, handle)
                } else {
                    self.resolve_inheriting(name, handle)
                };
                self.guard.leave();
                self.queue.remove(name);
                result?;
            }
        }
        Ok(handle)
    }

    /// The source of a mapped type is part of its base chain: the entry stays
    /// queued until the source is resolved, so a base pointing back here
    /// reaches the guard instead of an empty shell.
    fn resolve_mapped(&mut self, name: &str, handle: TypeHandle) -> Result<()> {
        let Some(TypeSchema::Mapped(mapped)) = self.queue.schema(name).cloned() else {
            return Ok(());
        };
        let source = self.resolve_ref(&mapped.source)?;
        if !self.queue.contains(name) {
            trace!(name, "resolved re-entrantly while its source was resolving");
            return Ok(());
        }
        self.init_mapped(handle, mapped, source)
    }

    fn resolve_inheriting(&mut self, name: &str, handle: TypeHandle) -> Result<()> {
        let Some(schema) = self.queue.schema(name).cloned() else {
            return Ok(());
        };
        let base = schema.base().map(|base| self.resolve_ref(base)).transpose()?;
        if !self.queue.contains(name) {
            // a field of the base chain pointed back here and finished the job
            trace!(name, "resolved re-entrantly while its base was resolving");
            return Ok(());
        }
        match schema {
            TypeSchema::Simple(simple) => self.init_simple(handle, simple, base),
            TypeSchema::Enum(enumeration) => self.init_enum(handle, enumeration, base),
            TypeSchema::Complex(complex) => {
                self.init_complex(handle, &complex, base)?;
                self.queue.remove(name);
                self.attach_fields(handle, complex)
            }
            TypeSchema::Union(_) | TypeSchema::Mapped(_) => {
                Err(ErrorKind::invalid(format!("{} has no base to resolve", schema.kind())).into())
            }
        }
    }

    /// Anonymous types get a fresh slot on every resolution; nothing can
    /// refer to them by name, so there is nothing to pre-allocate.
    fn resolve_inline(&mut self, schema: &TypeSchema) -> Result<TypeHandle> {
        let handle = self
            .document
            .allocate(DataType::shell(None, schema.kind(), self.document.id()));
        match schema.clone() {
            derived @ (TypeSchema::Union(_) | TypeSchema::Mapped(_)) => {
                self.initialize_derived(handle, derived)?;
            }
            schema => {
                let base = schema.base().map(|base| self.resolve_ref(base)).transpose()?;
                match schema {
                    TypeSchema::Simple(simple) => self.init_simple(handle, simple, base)?,
                    TypeSchema::Enum(enumeration) => self.init_enum(handle, enumeration, base)?,
                    TypeSchema::Complex(complex) => {
                        self.init_complex(handle, &complex, base)?;
                        self.attach_fields(handle, complex)?;
                    }
                    TypeSchema::Union(_) | TypeSchema::Mapped(_) => {}
                }
            }
        }
        Ok(handle)
    }

    fn initialize_derived(&mut self, handle: TypeHandle, schema: TypeSchema) -> Result<()> {
        match schema {
            TypeSchema::Union(union) => {
                let members = union
                    .types
                    .iter()
                    .map(|member| self.resolve_ref(member))
                    .collect::<Result<Vec<_>>>()?;
                self.init_union(handle, union, members)
            }
            TypeSchema::Mapped(mapped) => {
                let source = self.resolve_ref(&mapped.source)?;
                self.init_mapped(handle, mapped, source)
            }
            other => Err(ErrorKind::invalid(format!("{} is not a derived kind", other.kind())).into()),
        }
    }
}
