//! Pending named types.
//!
//! Entries keep insertion order. Presence of a name means "imported, not yet
//! resolved"; the resolver removes an entry at the point the type can no
//! longer be re-entered through its name.
use indexmap::IndexMap;

use crate::schema::{Kind, TypeSchema};
use crate::thunk::SourceId;

#[derive(Debug)]
pub(super) struct QueuedType {
    pub schema: TypeSchema,
    pub source: Option<SourceId>,
}

#[derive(Debug, Default)]
pub(super) struct TypeQueue {
    entries: IndexMap<String, QueuedType>,
}

impl TypeQueue {
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert(&mut self, name: String, entry: QueuedType) {
        self.entries.insert(name, entry);
    }

    /// Swap in the linked schema once dependencies have been imported.
    pub fn replace_schema(&mut self, name: &str, schema: TypeSchema) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.schema = schema;
        }
    }

    pub fn schema(&self, name: &str) -> Option<&TypeSchema> {
        self.entries.get(name).map(|entry| &entry.schema)
    }

    pub fn kind_of(&self, name: &str) -> Option<Kind> {
        self.schema(name).map(TypeSchema::kind)
    }

    pub fn take(&mut self, name: &str) -> Option<QueuedType> {
        self.entries.shift_remove(name)
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.shift_remove(name);
    }

    pub fn next_name(&self) -> Option<String> {
        self.entries.keys().next().cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueuedType)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ComplexSchema, UnionSchema};

    #[test]
    fn drains_in_insertion_order() {
        let mut queue = TypeQueue::default();
        for name in ["B", "A", "C"] {
            queue.insert(name.into(), QueuedType { schema: ComplexSchema::named(name).into(), source: None });
        }
        assert_eq!(queue.next_name().as_deref(), Some("B"));
        queue.remove("B");
        assert_eq!(queue.next_name().as_deref(), Some("A"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn replace_keeps_position_and_reports_kind() {
        let mut queue = TypeQueue::default();
        queue.insert("U".into(), QueuedType { schema: ComplexSchema::named("U").into(), source: None });
        queue.insert("V".into(), QueuedType { schema: ComplexSchema::named("V").into(), source: None });
        queue.replace_schema("U", UnionSchema::named("U").member("V").into());
        assert_eq!(queue.kind_of("U"), Some(Kind::Union));
        assert_eq!(queue.next_name().as_deref(), Some("U"));
        assert!(queue.take("U").is_some());
        assert!(!queue.contains("U"));
    }
}
