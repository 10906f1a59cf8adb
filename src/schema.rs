//! Data structures and types for PDF merging.
//!
//! This module defines the request-scoped types that flow through the binder,
//! including error types, the merge configuration, and the decoded request.
//! Nothing defined here outlives a single `mergePDFs` call.

use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced to the host as Promise rejection reasons.
///
/// The `Display` output of each variant is the exact rejection string the
/// host script receives.
#[derive(Debug, Error)]
pub enum BinderError {
    /// No documents were supplied, or the argument was not a sequence.
    #[error("no PDF files provided")]
    EmptyInput,
    /// A document's base64 payload could not be decoded.
    /// `index` is 1-based, matching the position the host supplied.
    #[error("failed to decode file {index}: {cause}")]
    Decode { index: usize, cause: String },
    /// The merge engine rejected the decoded documents.
    #[error("PDF merge failed: {0}")]
    Engine(#[from] MergeError),
}

/// Errors raised by a merge engine.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The engine was called with nothing to merge.
    #[error("no source documents")]
    NoSources,
    /// A source document could not be parsed.
    #[error("failed to parse document {index}: {source}")]
    Load {
        index: usize,
        #[source]
        source: lopdf::Error,
    },
    /// A document is missing part of the catalog/page tree structure.
    #[error("invalid document structure: {0}")]
    Structure(String),
    /// Serialising the merged document failed.
    #[error("failed to write merged document: {0}")]
    Save(String),
}

/// Outcome of one merge request: the base64-encoded merged PDF or the
/// reason it was rejected.
pub type MergeResult = Result<String, BinderError>;

/// Settings handed to the merge engine on every call.
///
/// Always built with [`MergeConfig::default`]; the binder runs without a
/// filesystem, so there is no profile to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    /// Compress content streams in the merged output.
    pub compress: bool,
    /// Drop objects no longer reachable from the merged catalog, such as
    /// the page trees of appended documents.
    pub prune_unused_objects: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            compress: true,
            prune_unused_objects: true,
        }
    }
}

/// One element of the host's `documents` array.
///
/// Only `data` is read; other fields the page attaches (`name`, `size`, ...)
/// are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct InputRecord {
    pub data: Option<String>,
}

/// A host document after marshaling, before base64 decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDocument {
    /// 1-based position in the host's array.
    pub index: usize,
    /// The base64 payload, or `None` when the element had no string `data`.
    pub data: Option<String>,
}

/// A decoded source document.
#[derive(Debug, Clone)]
pub struct InputDocument {
    /// Raw PDF bytes.
    pub bytes: Vec<u8>,
    /// 1-based position in the host's array, used in error messages.
    pub index: usize,
}

/// An ordered, non-empty set of decoded documents.
///
/// The order is the merge order.
#[derive(Debug)]
pub struct MergeRequest {
    documents: Vec<InputDocument>,
}

impl MergeRequest {
    /// Builds a request, rejecting an empty sequence.
    pub fn new(documents: Vec<InputDocument>) -> Result<Self, BinderError> {
        if documents.is_empty() {
            return Err(BinderError::EmptyInput);
        }
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[InputDocument] {
        &self.documents
    }

    /// Hands back the raw buffers in merge order.
    pub fn into_sources(self) -> Vec<Vec<u8>> {
        self.documents.into_iter().map(|doc| doc.bytes).collect()
    }
}
