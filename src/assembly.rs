//! # Assembly Module
//!
//! This module provides the WASM-exported `mergePDFs` entry point. It serves
//! as the bridge between JavaScript and the Rust merge engine.
//!
//! ## Overview
//!
//! A call flows through three stages:
//! - **Marshal**: the host's `documents` value is read into
//!   [`EncodedDocument`]s. An absent or empty list is rejected right away.
//! - **Pipeline**: on a background task, every payload is base64-decoded in
//!   order, the buffers are merged, and the result is base64-encoded.
//! - **Settle**: the returned Promise is resolved with the encoded PDF or
//!   rejected with a human-readable reason, exactly once.

use crate::file_utils::{decode_all, encode_output};
use crate::merge::{LopdfEngine, MergeEngine};
use crate::schema::{BinderError, EncodedDocument, InputRecord, MergeConfig, MergeResult};
use crate::settlement::{PromiseCallbacks, Settlement};
use js_sys::{Function, Promise};
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen_futures::spawn_local;

/// Flag passed through to the merge engine. When set, the engine inserts a
/// blank page between consecutive documents.
pub const DIVIDER_PAGE: bool = false;

/// Merges base64-encoded PDFs and returns a Promise for the merged document.
///
/// # Parameters
///
/// * `documents` - An array (or other iterable) of objects with a `data`
///                 field holding the base64-encoded PDF. Other fields are
///                 ignored. Array order is the merge order.
///
/// # Returns
///
/// A `Promise` that resolves to the merged PDF as a base64 string, or rejects
/// with a string describing the failure.
///
/// # Example
///
/// ```javascript
/// const merged = await mergePDFs([{ data: firstB64 }, { data: secondB64 }]);
/// const bytes = Uint8Array.from(atob(merged), (c) => c.charCodeAt(0));
/// ```
///
/// # Errors
///
/// The Promise rejects with:
/// - `no PDF files provided` when `documents` is missing, empty or not a list
/// - `failed to decode file N: ...` for the first payload that is not valid base64
/// - `PDF merge failed: ...` when the documents cannot be merged
#[wasm_bindgen(js_name = mergePDFs)]
pub fn merge_pdfs(documents: JsValue) -> Promise {
    let encoded = match read_documents(&documents) {
        Ok(encoded) => encoded,
        Err(err) => {
            crate::warn!("mergePDFs rejected: {}", err);
            return Promise::reject(&JsValue::from_str(&err.to_string()));
        }
    };
    crate::log!("mergePDFs: {} documents queued", encoded.len());

    let mut pending = Some(encoded);
    let mut executor = |resolve: Function, reject: Function| {
        let Some(encoded) = pending.take() else {
            return;
        };
        let settlement = Settlement::new(PromiseCallbacks { resolve, reject });
        spawn_local(async move {
            settlement.settle(run_merge(&LopdfEngine, encoded));
        });
    };
    Promise::new(&mut executor)
}

/// Reads the host's `documents` argument.
///
/// Elements are kept even when they have no usable `data`; those fail later,
/// in order, as decode failures.
fn read_documents(documents: &JsValue) -> Result<Vec<EncodedDocument>, BinderError> {
    if documents.is_null() || documents.is_undefined() || documents.is_string() {
        return Err(BinderError::EmptyInput);
    }
    let Ok(Some(items)) = js_sys::try_iter(documents) else {
        return Err(BinderError::EmptyInput);
    };

    let encoded: Vec<EncodedDocument> = items
        .enumerate()
        .map(|(idx, item)| EncodedDocument {
            index: idx + 1,
            data: item
                .ok()
                .and_then(|value| serde_wasm_bindgen::from_value::<InputRecord>(value).ok())
                .and_then(|record| record.data),
        })
        .collect();

    if encoded.is_empty() {
        return Err(BinderError::EmptyInput);
    }
    Ok(encoded)
}

/// Decodes, merges and re-encodes one request.
///
/// The configuration is built fresh for every call.
pub fn run_merge<E: MergeEngine>(engine: &E, documents: Vec<EncodedDocument>) -> MergeResult {
    let request = decode_all(documents)?;
    let count = request.documents().len();
    for doc in request.documents() {
        crate::log!("file {}: {} bytes", doc.index, doc.bytes.len());
    }
    let config = MergeConfig::default();

    let mut merged = Vec::new();
    engine.merge_raw(&request.into_sources(), &mut merged, DIVIDER_PAGE, &config)?;

    crate::log!("merged {} documents into {} bytes", count, merged.len());
    Ok(encode_output(&merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::tests::{page_widths, test_pdf};
    use crate::schema::MergeError;
    use crate::settlement::tests::{Outcome, Recorder};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use std::cell::RefCell;
    use std::io::Write;

    /// Engine double that records what it was asked to merge.
    #[derive(Default)]
    struct RecordingEngine {
        calls: RefCell<Vec<Vec<Vec<u8>>>>,
    }

    impl MergeEngine for RecordingEngine {
        fn merge_raw(
            &self,
            sources: &[Vec<u8>],
            sink: &mut dyn Write,
            _divider_page: bool,
            _config: &MergeConfig,
        ) -> Result<(), MergeError> {
            self.calls.borrow_mut().push(sources.to_vec());
            sink.write_all(b"%PDF-merged")
                .map_err(|e| MergeError::Save(e.to_string()))
        }
    }

    struct FailingEngine;

    impl MergeEngine for FailingEngine {
        fn merge_raw(
            &self,
            _sources: &[Vec<u8>],
            _sink: &mut dyn Write,
            _divider_page: bool,
            _config: &MergeConfig,
        ) -> Result<(), MergeError> {
            Err(MergeError::Structure("catalog has no Pages root".into()))
        }
    }

    fn documents(payloads: &[&str]) -> Vec<EncodedDocument> {
        payloads
            .iter()
            .enumerate()
            .map(|(idx, data)| EncodedDocument {
                index: idx + 1,
                data: Some(data.to_string()),
            })
            .collect()
    }

    fn pdf_b64(widths: &[i64]) -> String {
        STANDARD.encode(test_pdf(widths))
    }

    #[test]
    fn empty_input_never_reaches_engine() {
        let engine = RecordingEngine::default();
        let err = run_merge(&engine, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "no PDF files provided");
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn invalid_first_payload_is_reported_at_position_one() {
        let engine = RecordingEngine::default();
        let err = run_merge(&engine, documents(&["not-base64!!"])).unwrap_err();
        assert!(err.to_string().starts_with("failed to decode file 1: "));
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn invalid_second_payload_fails_before_merging() {
        let engine = RecordingEngine::default();
        let valid = pdf_b64(&[100]);
        let err = run_merge(&engine, documents(&[valid.as_str(), "bad"])).unwrap_err();
        assert!(matches!(err, BinderError::Decode { index: 2, .. }));
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn engine_receives_buffers_in_input_order() {
        let engine = RecordingEngine::default();
        let encoded = run_merge(&engine, documents(&["QQ==", "Qg==", "Qw=="])).unwrap();

        assert_eq!(STANDARD.decode(encoded).unwrap(), b"%PDF-merged");
        assert_eq!(
            *engine.calls.borrow(),
            vec![vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]]
        );
    }

    #[test]
    fn engine_failure_is_wrapped() {
        let err = run_merge(&FailingEngine, documents(&["QQ=="])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "PDF merge failed: invalid document structure: catalog has no Pages root"
        );
    }

    #[test]
    fn merges_two_single_page_documents() {
        let (first, second) = (pdf_b64(&[100]), pdf_b64(&[200]));
        let payloads = documents(&[first.as_str(), second.as_str()]);
        let encoded = run_merge(&LopdfEngine, payloads).unwrap();
        let merged = STANDARD.decode(encoded).unwrap();
        assert_eq!(page_widths(&merged), vec![100, 200]);
    }

    #[test]
    fn repeated_calls_produce_identical_output() {
        let payloads = [pdf_b64(&[100, 110]), pdf_b64(&[200])];
        let refs: Vec<&str> = payloads.iter().map(String::as_str).collect();
        let first = run_merge(&LopdfEngine, documents(&refs)).unwrap();
        let second = run_merge(&LopdfEngine, documents(&refs)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn concurrent_requests_do_not_interfere() {
        let left = [pdf_b64(&[100]), pdf_b64(&[110])];
        let right = [pdf_b64(&[300, 310]), pdf_b64(&[320])];

        let (left_out, right_out) = std::thread::scope(|scope| {
            let left = scope.spawn(|| {
                let refs: Vec<&str> = left.iter().map(String::as_str).collect();
                run_merge(&LopdfEngine, documents(&refs)).unwrap()
            });
            let right = scope.spawn(|| {
                let refs: Vec<&str> = right.iter().map(String::as_str).collect();
                run_merge(&LopdfEngine, documents(&refs)).unwrap()
            });
            (left.join().unwrap(), right.join().unwrap())
        });

        assert_eq!(page_widths(&STANDARD.decode(left_out).unwrap()), vec![100, 110]);
        assert_eq!(
            page_widths(&STANDARD.decode(right_out).unwrap()),
            vec![300, 310, 320]
        );
    }

    #[test]
    fn each_request_settles_exactly_once() {
        let ok = Recorder::default();
        let result = run_merge(&RecordingEngine::default(), documents(&["QQ=="]));
        Settlement::new(ok.clone()).settle(result);
        assert!(matches!(ok.outcomes().as_slice(), [Outcome::Resolved(_)]));

        let failed = Recorder::default();
        let result = run_merge(&RecordingEngine::default(), documents(&["bad"]));
        Settlement::new(failed.clone()).settle(result);
        assert!(matches!(
            failed.outcomes().as_slice(),
            [Outcome::Rejected(reason)] if reason.starts_with("failed to decode file 1")
        ));
    }
}
