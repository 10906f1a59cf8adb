//! Base64 marshaling helpers for document payloads.
//!
//! The host passes every PDF as a base64 string and expects the merged
//! document back the same way. Decoding is fail-fast: the first document that
//! cannot be decoded rejects the whole request.

use crate::schema::{BinderError, EncodedDocument, InputDocument, MergeRequest};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes one host document into raw bytes.
///
/// Surrounding ASCII whitespace is trimmed first; anything else outside the
/// standard alphabet (with padding) is a decode failure naming `doc.index`.
pub fn decode_document(doc: EncodedDocument) -> Result<InputDocument, BinderError> {
    let Some(data) = doc.data else {
        return Err(BinderError::Decode {
            index: doc.index,
            cause: "missing base64 data field".into(),
        });
    };

    let bytes = STANDARD
        .decode(data.trim_ascii())
        .map_err(|e| BinderError::Decode {
            index: doc.index,
            cause: e.to_string(),
        })?;

    if !has_pdf_header(&bytes) {
        crate::warn!("file {} does not start with a PDF header", doc.index);
    }

    Ok(InputDocument {
        bytes,
        index: doc.index,
    })
}

/// Decodes every document in order and builds the merge request.
///
/// Stops at the first failure; nothing after it is decoded.
pub fn decode_all(docs: Vec<EncodedDocument>) -> Result<MergeRequest, BinderError> {
    let decoded = docs
        .into_iter()
        .map(decode_document)
        .collect::<Result<Vec<_>, _>>()?;
    MergeRequest::new(decoded)
}

/// Encodes the merged document for the host.
pub fn encode_output(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Checks for the `%PDF-` magic at the start of the buffer.
pub fn has_pdf_header(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}
