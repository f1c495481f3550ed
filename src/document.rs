//! The document registry.
//!
//! A [`Document`] owns an arena of [`DataType`] slots, the name → handle map of
//! its own named types, and the already-built documents it references by
//! namespace. Lookups of `ns:Name` go through the reference with that
//! namespace; unqualified names are searched in the document first and then in
//! its references, in the order they were added.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data_type::{DataType, Field, TypeBody};
use crate::thunk::SourceId;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

/// Stable identity of a data type: the owning document plus an arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle {
    document: DocumentId,
    index: u32,
}

impl TypeHandle {
    pub fn document(&self) -> DocumentId {
        self.document
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    url: Option<String>,
    info: DocumentInfo,
    builtin: bool,
    slots: Vec<DataType>,
    types: IndexMap<String, TypeHandle>,
    references: IndexMap<String, Arc<Document>>,
    by_source: HashMap<SourceId, TypeHandle>,
}

// ————————————————————————————————————————————————————————————————————————————
// PUBLIC API
// ————————————————————————————————————————————————————————————————————————————

impl Document {
    pub fn id(&self) -> DocumentId {
        self.id
    }
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Number of named types owned by this document.
    pub fn len(&self) -> usize {
        self.types.len()
    }
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = (&str, TypeHandle)> {
        self.types.iter().map(|(name, handle)| (name.as_str(), *handle))
    }

    pub fn references(&self) -> impl Iterator<Item = (&str, &Arc<Document>)> {
        self.references.iter().map(|(ns, doc)| (ns.as_str(), doc))
    }

    pub fn reference(&self, namespace: &str) -> Option<&Arc<Document>> {
        self.references.get(namespace)
    }

    /// Own named type, ignoring references.
    pub fn get_own(&self, name: &str) -> Option<TypeHandle> {
        self.types.get(name).copied()
    }

    /// Case-sensitive lookup of `Name` or `ns:Name`.
    pub fn get(&self, name: &str) -> Option<TypeHandle> {
        if let Some((namespace, rest)) = name.split_once(':') {
            return self.references.get(namespace)?.get(rest);
        }
        self.get_own(name)
            .or_else(|| self.references.values().find_map(|doc| doc.get(name)))
    }

    pub fn get_type(&self, name: &str) -> Option<&DataType> {
        self.get(name).and_then(|handle| self.data_type(handle))
    }

    pub fn data_type(&self, handle: TypeHandle) -> Option<&DataType> {
        self.owner_of(handle)?.slots.get(handle.index as usize)
    }

    /// The document (this one or a transitive reference) whose arena holds `handle`.
    pub fn owner_of(&self, handle: TypeHandle) -> Option<&Document> {
        self.find_document(handle.document)
    }

    /// This document or the transitive reference with the given id.
    pub fn find_document(&self, id: DocumentId) -> Option<&Document> {
        if self.id == id {
            return Some(self);
        }
        self.references.values().find_map(|doc| doc.find_document(id))
    }

    /// Lookup by constructor: the named type imported from `source`.
    pub fn find_by_source(&self, source: SourceId) -> Option<TypeHandle> {
        self.by_source
            .get(&source)
            .copied()
            .or_else(|| self.references.values().find_map(|doc| doc.find_by_source(source)))
    }

    /// Name under which `handle` is reachable from this document.
    ///
    /// Types of non-builtin references are prefixed with their namespace;
    /// anonymous types have no name.
    pub fn qualified_name(&self, handle: TypeHandle) -> Option<String> {
        if handle.document == self.id {
            return self.data_type(handle)?.name.clone();
        }
        self.references.iter().find_map(|(namespace, doc)| {
            let name = doc.qualified_name(handle)?;
            Some(if doc.builtin { name } else { format!("{namespace}:{name}") })
        })
    }

    /// Effective fields of a complex type, or the projected fields of a mapped type.
    pub fn fields_of(&self, handle: TypeHandle) -> Option<Vec<Field>> {
        match &self.data_type(handle)?.body {
            TypeBody::Complex(c) => Some(c.fields.values().cloned().collect()),
            TypeBody::Mapped(m) => Some(m.project(self.fields_of(m.source)?)),
            _ => None,
        }
    }

    /// `handle` followed by its bases, nearest first.
    pub fn base_chain(&self, handle: TypeHandle) -> Vec<TypeHandle> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            if !seen.insert(h) {
                break;
            }
            chain.push(h);
            current = self.data_type(h).and_then(DataType::base);
        }
        chain
    }

    /// Re-index after the type map changed: sort names and rebuild the
    /// source index.
    pub fn invalidate(&mut self) {
        self.types.sort_keys();
        self.by_source = self
            .types
            .values()
            .filter_map(|handle| {
                let source = self.slots.get(handle.index as usize)?.source?;
                Some((source, *handle))
            })
            .collect();
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILD-TIME API
// ————————————————————————————————————————————————————————————————————————————

impl Document {
    pub(crate) fn new(url: Option<String>, info: DocumentInfo) -> Self {
        Self {
            id: DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed)),
            url,
            info,
            builtin: false,
            slots: Vec::new(),
            types: IndexMap::new(),
            references: IndexMap::new(),
            by_source: HashMap::new(),
        }
    }

    pub(crate) fn mark_builtin(&mut self) {
        self.builtin = true;
    }

    pub(crate) fn allocate(&mut self, data_type: DataType) -> TypeHandle {
        let handle = TypeHandle { document: self.id, index: self.slots.len() as u32 };
        self.slots.push(data_type);
        handle
    }

    pub(crate) fn register(&mut self, name: &str, handle: TypeHandle) {
        self.types.insert(name.to_string(), handle);
    }

    /// Mutable access to a slot of this document's own arena.
    pub(crate) fn slot_mut(&mut self, handle: TypeHandle) -> Option<&mut DataType> {
        if handle.document != self.id {
            return None;
        }
        self.slots.get_mut(handle.index as usize)
    }

    pub(crate) fn own_handles(&self) -> Vec<TypeHandle> {
        (0..self.slots.len() as u32)
            .map(|index| TypeHandle { document: self.id, index })
            .collect()
    }

    pub(crate) fn add_reference(&mut self, namespace: String, document: Arc<Document>) {
        self.references.insert(namespace, document);
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
