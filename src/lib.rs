mod assembly;
mod file_utils;
mod lifecycle;
mod merge;
mod schema;
mod settlement;

pub use assembly::merge_pdfs;
pub use lifecycle::ENTRY_POINT;

/// Logs to the browser console. Off wasm the message is formatted and dropped.
#[macro_export]
macro_rules! log {
    ($($t:tt)*) => {{
        #[cfg(target_arch = "wasm32")]
        ::web_sys::console::log_1(&format!($($t)*).into());
        #[cfg(not(target_arch = "wasm32"))]
        let _ = format!($($t)*);
    }};
}

/// Like [`log!`], at warning level.
#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => {{
        #[cfg(target_arch = "wasm32")]
        ::web_sys::console::warn_1(&format!($($t)*).into());
        #[cfg(not(target_arch = "wasm32"))]
        let _ = format!($($t)*);
    }};
}
