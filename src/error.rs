//! Build-time errors.
//!
//! Every failure raised while importing or resolving types is a [`DocumentError`]:
//! an [`ErrorKind`] plus the breadcrumb of where in the document it happened.
//! The breadcrumb is assembled while the error unwinds; each resolution frame
//! prefixes its own segment via [`DocumentError::at`].
use std::collections::VecDeque;
use std::fmt;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A thunk lacks the declarative schema it must carry.
    #[error("{what} has no type metadata declared")]
    MissingMetadata { what: String },

    #[error("a type named \"{name}\" is already registered")]
    DuplicateTypeName { name: String },

    /// The base chain revisits a name; `chain` lists names in visit order.
    #[error("circular base reference: {}", chain.join(" -> "))]
    CircularBaseReference { chain: Vec<String> },

    #[error("invalid schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("type mismatch: {subject} must be {expected}, found {found}")]
    TypeMismatch {
        subject: String,
        expected: String,
        found: String,
    },

    #[error("unknown type \"{name}\"")]
    UnresolvedReference { name: String },

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("circular document reference: {}", chain.join(" -> "))]
    CircularDocumentReference { chain: Vec<String> },
}

impl ErrorKind {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidSchema { reason: reason.into() }
    }
}

/// One breadcrumb step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A document section such as `Types` or `References`.
    Section(&'static str),
    /// A type or namespace name.
    Name(String),
    Field(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorPath {
    segments: VecDeque<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentError {
    pub path: ErrorPath,
    pub kind: ErrorKind,
}

pub type Result<T, E = DocumentError> = std::result::Result<T, E>;

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ErrorPath {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter()
    }
    fn prepend(&mut self, segment: PathSegment) {
        self.segments.push_front(segment);
    }
}

impl fmt::Display for ErrorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ix, segment) in self.segments.iter().enumerate() {
            let sep = match segment {
                _ if ix == 0 => "",
                PathSegment::Field(_) => ".",
                _ => "/",
            };
            match segment {
                PathSegment::Section(section) => write!(f, "{sep}{section}")?,
                PathSegment::Name(name) | PathSegment::Field(name) => write!(f, "{sep}{name}")?,
            }
        }
        Ok(())
    }
}

impl DocumentError {
    /// Prefix the breadcrumb with `segment` (outermost frames call this last).
    pub fn at(mut self, segment: PathSegment) -> Self {
        self.path.prepend(segment);
        self
    }
    pub fn at_field(self, name: &str) -> Self {
        self.at(PathSegment::Field(name.to_string()))
    }
    pub fn at_type(self, name: &str) -> Self {
        self.at(PathSegment::Name(name.to_string()))
    }
    pub fn at_section(self, section: &'static str) -> Self {
        self.at(PathSegment::Section(section))
    }
}

impl From<ErrorKind> for DocumentError {
    fn from(kind: ErrorKind) -> Self {
        Self { path: ErrorPath::default(), kind }
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "Error at {}: {}", self.path, self.kind)
        }
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
