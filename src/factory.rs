//! Document factory.
//!
//! Building a document is a two-phase pipeline:
//!
//! 1. **import**: every thunk is forced, its schema validated and linked, and
//!    named types land in a [`TypeQueue`](queue::TypeQueue). Sources seen
//!    before are served from the build cache so the same source reached from
//!    two places is imported once.
//! 2. **resolve**: a shell is pre-allocated for every queued name, then the
//!    queue is drained. Base chains are walked with a
//!    [`CircularGuard`](guard::CircularGuard); field types are resolved after
//!    the owning type's shell exists, which is what lets types refer to
//!    themselves and to each other.
//!
//! Referenced documents (by URL or inline) are built first, recursively, and
//! are read-only from the point of view of the document that references them.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::config::FactoryConfig;
use crate::description::DocumentDescription;
use crate::design_type::DesignTypeMap;
use crate::document::{Document, DocumentId, DocumentInfo};
use crate::error::{ErrorKind, Result};
use crate::fetch::{DefaultFetcher, DocumentFetcher};
use crate::schema::{TypeSchema, validate_type_name};
use crate::thunk::{SourceId, Thunk};

mod guard;
mod importer;
mod initializers;
mod queue;
mod resolver;

use guard::CircularGuard;
use queue::TypeQueue;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Everything a document is built from.
#[derive(Debug, Clone, Default)]
pub struct DocumentInit {
    pub url: Option<String>,
    pub info: DocumentInfo,
    pub references: IndexMap<String, DocumentReference>,
    pub types: TypeDefinitions,
    /// Skip the implicit reference to the builtin document.
    pub no_builtin_types: bool,
}

#[derive(Debug, Clone)]
pub enum DocumentReference {
    /// An already-built document, shared as is.
    Document(Arc<Document>),
    /// Fetched and built before the referencing document.
    Url(String),
    /// Built from an inline init before the referencing document.
    Inline(Box<DocumentInit>),
}

/// Types to import: a plain list of thunks, or a map whose keys name them.
#[derive(Debug, Clone)]
pub enum TypeDefinitions {
    List(Vec<Thunk>),
    Map(IndexMap<String, Thunk>),
}

impl Default for TypeDefinitions {
    fn default() -> Self {
        TypeDefinitions::List(Vec::new())
    }
}

impl TypeDefinitions {
    pub fn len(&self) -> usize {
        match self {
            TypeDefinitions::List(list) => list.len(),
            TypeDefinitions::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a thunk. A map-form set is turned into a list first, with each
    /// unnamed inline schema taking its key as name.
    pub fn push(&mut self, thunk: Thunk) {
        if let TypeDefinitions::Map(map) = self {
            let list = std::mem::take(map)
                .into_iter()
                .map(|(key, thunk)| match thunk {
                    Thunk::Schema(mut schema) if schema.name().is_none() => {
                        schema.set_name(Some(key));
                        Thunk::Schema(schema)
                    }
                    other => other,
                })
                .collect();
            *self = TypeDefinitions::List(list);
        }
        if let TypeDefinitions::List(list) = self {
            list.push(thunk);
        }
    }
}

pub struct DocumentFactory {
    config: FactoryConfig,
    design_types: Arc<DesignTypeMap>,
    fetcher: Arc<dyn DocumentFetcher>,
    builtins: OnceCell<Arc<Document>>,
}

/// How a source was imported earlier in the same build.
#[derive(Debug, Clone)]
enum CachedImport {
    Named { document: DocumentId, name: String },
    Inline(Box<TypeSchema>),
}

/// State shared by a top-level build and the builds of its references.
struct BuildContext<'f> {
    factory: &'f DocumentFactory,
    cache: HashMap<SourceId, CachedImport>,
    fetched: HashMap<String, Arc<Document>>,
    url_stack: Vec<String>,
}

/// Per-document build state.
struct DocumentBuilder<'c, 'f> {
    ctx: &'c mut BuildContext<'f>,
    document: Document,
    queue: TypeQueue,
    guard: CircularGuard,
    /// Anonymous sources being imported; re-entering one is a self-reference
    /// that could never terminate.
    importing: HashSet<SourceId>,
}

// ————————————————————————————————————————————————————————————————————————————
// PUBLIC API
// ————————————————————————————————————————————————————————————————————————————

impl DocumentInit {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
    pub fn with_info(mut self, info: DocumentInfo) -> Self {
        self.info = info;
        self
    }
    pub fn reference(mut self, namespace: impl Into<String>, reference: DocumentReference) -> Self {
        self.references.insert(namespace.into(), reference);
        self
    }
    pub fn with_type(mut self, thunk: impl Into<Thunk>) -> Self {
        self.types.push(thunk.into());
        self
    }
    pub fn with_types<I, T>(mut self, thunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Thunk>,
    {
        for thunk in thunks {
            self = self.with_type(thunk);
        }
        self
    }
    pub fn without_builtins(mut self) -> Self {
        self.no_builtin_types = true;
        self
    }
}

impl DocumentFactory {
    pub fn new() -> Self {
        Self::with_config(FactoryConfig::default())
    }

    pub fn with_config(config: FactoryConfig) -> Self {
        let fetcher = Arc::new(DefaultFetcher::new(config.fetch_timeout()));
        Self {
            config,
            design_types: DesignTypeMap::builtin(),
            fetcher,
            builtins: OnceCell::new(),
        }
    }

    pub fn with_design_types(mut self, design_types: Arc<DesignTypeMap>) -> Self {
        self.design_types = design_types;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// The builtin document, built on first use and shared afterwards.
    pub fn builtin_document(&self) -> Result<Arc<Document>> {
        self.builtins
            .get_or_try_init(|| {
                let mut ctx = BuildContext::new(self);
                let mut document = ctx.build(crate::builtins::builtin_init())?;
                document.mark_builtin();
                Ok(Arc::new(document))
            })
            .cloned()
    }

    pub fn create_document(&self, init: DocumentInit) -> Result<Document> {
        BuildContext::new(self).build(init)
    }

    /// Fetch a JSON document description and build it.
    pub fn create_document_from_url(&self, url: &str) -> Result<Document> {
        BuildContext::new(self).build_from_url(url)
    }
}

impl Default for DocumentFactory {
    fn default() -> Self {
        Self::new()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILD CONTEXT
// ————————————————————————————————————————————————————————————————————————————

impl<'f> BuildContext<'f> {
    fn new(factory: &'f DocumentFactory) -> Self {
        Self {
            factory,
            cache: HashMap::new(),
            fetched: HashMap::new(),
            url_stack: Vec::new(),
        }
    }

    fn build(&mut self, init: DocumentInit) -> Result<Document> {
        let DocumentInit { url, info, references, types, no_builtin_types } = init;
        let mut document = Document::new(url, info);

        if !no_builtin_types {
            let builtins = self.factory.builtin_document()?;
            document.add_reference(self.factory.config.builtin_namespace.clone(), builtins);
        }
        for (namespace, reference) in references {
            let referenced = self
                .reference(&namespace, reference)
                .map_err(|error| error.at_type(&namespace).at_section("References"))?;
            document.add_reference(namespace, referenced);
        }

        let mut builder = DocumentBuilder::new(self, document);
        builder.import_definitions(types)?;
        builder.allocate_shells();
        builder.drain()?;
        let document = builder.finish()?;

        info!(
            url = document.url().unwrap_or("<inline>"),
            types = document.len(),
            references = document.references().count(),
            "document built"
        );
        Ok(document)
    }

    fn reference(&mut self, namespace: &str, reference: DocumentReference) -> Result<Arc<Document>> {
        validate_type_name(namespace)?;
        if namespace == self.factory.config.builtin_namespace {
            return Err(ErrorKind::invalid(format!(
                "namespace \"{namespace}\" is reserved for builtin types"
            ))
            .into());
        }
        match reference {
            DocumentReference::Document(document) => Ok(document),
            DocumentReference::Url(url) => self.fetch_document(&url),
            DocumentReference::Inline(init) => self.build(*init).map(Arc::new),
        }
    }

    fn build_from_url(&mut self, url: &str) -> Result<Document> {
        let text = self.factory.fetcher.fetch(url)?;
        let mut init = DocumentInit::from(DocumentDescription::from_json_str(&text)?);
        if init.url.is_none() {
            init.url = Some(url.to_string());
        }
        self.url_stack.push(url.to_string());
        let result = self.build(init);
        self.url_stack.pop();
        result
    }

    fn fetch_document(&mut self, url: &str) -> Result<Arc<Document>> {
        if let Some(document) = self.fetched.get(url) {
            debug!(%url, "reusing document fetched earlier in this build");
            return Ok(document.clone());
        }
        if self.url_stack.iter().any(|pending| pending == url) {
            let mut chain = self.url_stack.clone();
            chain.push(url.to_string());
            return Err(ErrorKind::CircularDocumentReference { chain }.into());
        }
        if self.url_stack.len() >= self.factory.config.max_reference_depth {
            return Err(ErrorKind::Fetch {
                url: url.to_string(),
                reason: format!(
                    "references nest deeper than {} documents",
                    self.factory.config.max_reference_depth
                ),
            }
            .into());
        }
        let document = Arc::new(self.build_from_url(url)?);
        self.fetched.insert(url.to_string(), document.clone());
        Ok(document)
    }
}

impl<'c, 'f> DocumentBuilder<'c, 'f> {
    fn new(ctx: &'c mut BuildContext<'f>, document: Document) -> Self {
        Self {
            ctx,
            document,
            queue: TypeQueue::default(),
            guard: CircularGuard::default(),
            importing: HashSet::new(),
        }
    }
}
