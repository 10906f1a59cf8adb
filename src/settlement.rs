//! One-shot settlement of a host Promise.
//!
//! A [`Settlement`] owns the resolve/reject pair captured by the Promise
//! executor. Settling consumes it, so a request can resolve or reject at most
//! once; dropping it unsettled rejects, so it settles at least once too.

use crate::schema::MergeResult;
use js_sys::Function;
use wasm_bindgen::JsValue;

/// Rejection reason used when a settlement is dropped without a result.
pub const ABANDONED_REASON: &str = "merge task ended without a result";

/// The two continuations of a pending Promise.
pub trait Settle {
    fn resolve(self, value: String);
    fn reject(self, reason: String);
}

/// Guard around a pending call's continuations.
pub struct Settlement<S: Settle> {
    callbacks: Option<S>,
}

impl<S: Settle> Settlement<S> {
    pub fn new(callbacks: S) -> Self {
        Self {
            callbacks: Some(callbacks),
        }
    }

    /// Resolves with the encoded PDF or rejects with the error text.
    pub fn settle(mut self, result: MergeResult) {
        let Some(callbacks) = self.callbacks.take() else {
            return;
        };
        match result {
            Ok(encoded) => callbacks.resolve(encoded),
            Err(err) => {
                crate::warn!("mergePDFs rejected: {}", err);
                callbacks.reject(err.to_string());
            }
        }
    }
}

impl<S: Settle> Drop for Settlement<S> {
    fn drop(&mut self) {
        if let Some(callbacks) = self.callbacks.take() {
            crate::warn!("mergePDFs rejected: {}", ABANDONED_REASON);
            callbacks.reject(ABANDONED_REASON.to_string());
        }
    }
}

/// The `resolve`/`reject` functions handed to a `Promise` executor.
pub struct PromiseCallbacks {
    pub resolve: Function,
    pub reject: Function,
}

impl Settle for PromiseCallbacks {
    fn resolve(self, value: String) {
        let value = JsValue::from_str(&value);
        if let Err(err) = self.resolve.call1(&JsValue::NULL, &value) {
            crate::warn!("resolve callback threw: {:?}", err);
        }
    }

    fn reject(self, reason: String) {
        let reason = JsValue::from_str(&reason);
        if let Err(err) = self.reject.call1(&JsValue::NULL, &reason) {
            crate::warn!("reject callback threw: {:?}", err);
        }
    }
}
