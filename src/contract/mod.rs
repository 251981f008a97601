//! API contract loading and validation.
//!
//! This module handles:
//! - Resolving contract bytes from bundled and on-disk sources
//! - Parsing OpenAPI 3.x YAML/JSON into a [`Contract`]
//! - Structural validation before any route is bound

pub mod model;
pub mod source;
pub mod validate;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ParseError, ValidationError};

pub use model::{DeclaredOperation, Document, HttpMethod, PathTemplate};
pub use source::{BundledSource, ContractSource, FileSource, SourceChain, BUNDLED_CONTRACT};

/// Parsed API contract.
///
/// Holds both the typed document and the raw tree so `$ref` pointers can be
/// resolved against exactly what was loaded.
#[derive(Debug, Clone)]
pub struct Contract {
    document: Document,
    raw: Value,
}

impl Contract {
    /// Parse YAML or JSON contract bytes. Does not validate.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let raw: Value = serde_yaml::from_slice(bytes)?;
        if !raw.is_object() {
            return Err(ParseError::NotAMapping);
        }

        let document = Document::deserialize(&raw)?;
        Ok(Self { document, raw })
    }

    /// Run every structural check; see [`validate::validate`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate::validate(self)
    }

    /// Parse then validate.
    pub fn load(bytes: &[u8]) -> crate::Result<Self> {
        let contract = Self::parse(bytes)?;
        contract.validate()?;
        Ok(contract)
    }

    /// Typed document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Raw document tree.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// `info.title`.
    pub fn title(&self) -> &str {
        &self.document.info.title
    }

    /// `info.version`.
    pub fn version(&self) -> &str {
        &self.document.info.version
    }

    /// Resolve a local reference such as `#/components/schemas/Health`.
    pub fn resolve(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        if pointer.is_empty() {
            return Some(&self.raw);
        }
        self.raw.pointer(pointer)
    }

    /// Resolve `item`, following a reference when needed.
    pub fn resolve_item<T>(&self, item: &model::RefOr<T>) -> Option<T>
    where
        T: Clone + for<'de> Deserialize<'de>,
    {
        match item {
            model::RefOr::Item(inner) => Some(inner.clone()),
            model::RefOr::Ref { reference } => self
                .resolve(reference)
                .and_then(|value| T::deserialize(value).ok()),
        }
    }

    /// Every declared operation, ordered by path then method.
    pub fn operations(&self) -> Vec<DeclaredOperation> {
        self.document
            .paths
            .iter()
            .flat_map(|(path, item)| {
                item.operations().map(move |(method, op)| DeclaredOperation {
                    method,
                    path: path.clone(),
                    key: DeclaredOperation::key_for(method, path, op),
                })
            })
            .collect()
    }
}
