//! Type sources and thunks.
//!
//! A [`TypeSource`] is the explicit registration a declaring "class" performs:
//! it owns the declarative schema and, for simple types, the decode/encode
//! behaviour. Sources are compared by [`SourceId`], never by name, which is
//! what lets the importer recognise the same source reached from two fields.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::error::ErrorKind;
use crate::schema::TypeSchema;

/// Upper bound on chained deferred thunks; a longer chain is treated as a loop.
const MAX_DEFERRED_DEPTH: usize = 64;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    fn next() -> Self {
        SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Decode/encode behaviour a simple type's source contributes to codecs.
///
/// Hooks are opaque to the resolver; they only run when a codec is applied.
pub trait CodecHooks: Send + Sync {
    fn decode(&self, value: &Value) -> Result<Value, String>;
    fn encode(&self, value: &Value) -> Result<Value, String> {
        self.decode(value)
    }
}

pub struct TypeSource {
    id: SourceId,
    label: String,
    metadata: Option<TypeSchema>,
    hooks: Option<Arc<dyn CodecHooks>>,
}

pub type DeferredFn = dyn Fn() -> Result<Thunk, ErrorKind> + Send + Sync;

/// A reference to a type that may need indirection before it can be imported.
#[derive(Clone)]
pub enum Thunk {
    /// A type already known by name, in this build or a referenced document.
    Name(String),
    Source(Arc<TypeSource>),
    /// An inline declaration with no backing source.
    Schema(Box<TypeSchema>),
    /// Produced on demand; forced before anything else looks at it.
    Deferred(Arc<DeferredFn>),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeSource {
    pub fn new(schema: impl Into<TypeSchema>) -> Self {
        let schema = schema.into();
        let label = schema.name().unwrap_or("<anonymous>").to_string();
        Self { id: SourceId::next(), label, metadata: Some(schema), hooks: None }
    }

    /// A source that never declared its shape; importing it fails.
    pub fn undeclared(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { id: SourceId::next(), label: label.into(), metadata: None, hooks: None })
    }

    /// Build a source whose schema refers to the source itself.
    pub fn cyclic(label: impl Into<String>, declare: impl FnOnce(Thunk) -> TypeSchema) -> Arc<Self> {
        let label = label.into();
        Arc::new_cyclic(|weak: &Weak<TypeSource>| {
            let me = Thunk::from_weak(weak.clone(), label.clone());
            Self { id: SourceId::next(), label, metadata: Some(declare(me)), hooks: None }
        })
    }

    pub fn with_hooks(mut self, hooks: impl CodecHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn id(&self) -> SourceId {
        self.id
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn metadata(&self) -> Option<&TypeSchema> {
        self.metadata.as_ref()
    }
    pub fn hooks(&self) -> Option<&Arc<dyn CodecHooks>> {
        self.hooks.as_ref()
    }
}

impl fmt::Debug for TypeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSource")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("declared", &self.metadata.is_some())
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

impl Thunk {
    pub fn named(name: impl Into<String>) -> Self {
        Thunk::Name(name.into())
    }

    pub fn deferred(produce: impl Fn() -> Result<Thunk, ErrorKind> + Send + Sync + 'static) -> Self {
        Thunk::Deferred(Arc::new(produce))
    }

    fn from_weak(weak: Weak<TypeSource>, label: String) -> Self {
        Thunk::deferred(move || {
            weak.upgrade().map(Thunk::Source).ok_or_else(|| ErrorKind::MissingMetadata {
                what: format!("dropped type source \"{label}\""),
            })
        })
    }

    /// Follow deferred indirections until a concrete thunk is reached.
    pub fn force(&self) -> Result<Thunk, ErrorKind> {
        let mut current = self.clone();
        for _ in 0..MAX_DEFERRED_DEPTH {
            match current {
                Thunk::Deferred(produce) => current = produce()?,
                concrete => return Ok(concrete),
            }
        }
        Err(ErrorKind::invalid(format!(
            "deferred thunk did not settle after {MAX_DEFERRED_DEPTH} steps"
        )))
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Thunk::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Thunk::Source(source) => f.debug_tuple("Source").field(source).finish(),
            Thunk::Schema(schema) => f.debug_tuple("Schema").field(schema).finish(),
            Thunk::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for Thunk {
    fn from(name: &str) -> Self {
        Thunk::Name(name.to_string())
    }
}

impl From<Arc<TypeSource>> for Thunk {
    fn from(source: Arc<TypeSource>) -> Self {
        Thunk::Source(source)
    }
}

impl From<TypeSchema> for Thunk {
    fn from(schema: TypeSchema) -> Self {
        Thunk::Schema(Box::new(schema))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
