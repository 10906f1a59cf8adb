//! Module start-up and global registration.
//!
//! Host pages call the binder through `globalThis.mergePDFs`. The closure
//! installed there is parked in a thread-local slot that is never cleared, so
//! it stays callable for as long as the host keeps the module instance.

use crate::assembly::merge_pdfs;
use js_sys::{Promise, Reflect};
use std::cell::RefCell;
use wasm_bindgen::prelude::*;

/// Name the entry point is registered under on the JS global object.
pub const ENTRY_POINT: &str = "mergePDFs";

thread_local! {
    static ENTRY: RefCell<Option<Closure<dyn Fn(JsValue) -> Promise>>> =
        const { RefCell::new(None) };
}

/// Runs when the wasm module is instantiated.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    register()?;
    crate::log!("WASM PDF binder initialized");
    Ok(())
}

/// Installs the entry point on `globalThis`. A second call keeps the
/// closure that is already registered.
fn register() -> Result<(), JsValue> {
    ENTRY.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Ok(());
        }

        let entry = Closure::<dyn Fn(JsValue) -> Promise>::new(merge_pdfs);
        let installed = Reflect::set(
            &js_sys::global(),
            &JsValue::from_str(ENTRY_POINT),
            entry.as_ref(),
        )?;
        if !installed {
            return Err(JsValue::from_str(&format!(
                "could not register {ENTRY_POINT} on the global object"
            )));
        }

        *slot = Some(entry);
        Ok(())
    })
}
