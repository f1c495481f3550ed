//! JSON description of a document.
//!
//! This is the wire shape fetched for URL references and produced by
//! [`Document::describe`](crate::document::Document::describe): document
//! metadata, references by namespace, and a name-keyed map of type schemas.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::document::DocumentInfo;
use crate::error::DocumentError;
use crate::factory::{DocumentInit, DocumentReference, TypeDefinitions};
use crate::schema::{TypeSchema, is_false};
use crate::thunk::Thunk;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub info: DocumentInfo,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub references: IndexMap<String, ReferenceDescription>,
    #[serde(default)]
    pub types: IndexMap<String, TypeSchema>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_builtin_types: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceDescription {
    Url(String),
    Inline(Box<DocumentDescription>),
}

impl DocumentDescription {
    pub fn from_json_str(src: &str) -> Result<Self, DocumentError> {
        Ok(crate::path_de::from_str_with_path(src)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, DocumentError> {
        Ok(crate::path_de::from_value_with_path(value)?)
    }
}

impl From<DocumentDescription> for DocumentInit {
    fn from(description: DocumentDescription) -> Self {
        let references = description
            .references
            .into_iter()
            .map(|(namespace, reference)| {
                let reference = match reference {
                    ReferenceDescription::Url(url) => DocumentReference::Url(url),
                    ReferenceDescription::Inline(inner) => {
                        DocumentReference::Inline(Box::new(DocumentInit::from(*inner)))
                    }
                };
                (namespace, reference)
            })
            .collect();
        let types = description
            .types
            .into_iter()
            .map(|(name, schema)| (name, Thunk::Schema(Box::new(schema))))
            .collect();
        DocumentInit {
            url: description.url,
            info: description.info,
            references,
            types: TypeDefinitions::Map(types),
            no_builtin_types: description.no_builtin_types,
        }
    }
}
