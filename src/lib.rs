//! Staff Composer WASM Module
//!
//! Turns sustainability-indicator values into notes on an 8-slot staff:
//! pitch mapping, slot management, staff projection, looping playback,
//! and per-session interaction logging.

pub mod models;
pub mod renderers;
pub mod playback;
pub mod session;
pub mod selection;
pub mod controller;
pub mod api;

// Re-export commonly used types
pub use controller::{StaffController, ComposerEvent, ComposerError, RenderPatch};
pub use models::*;

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    if let Err(e) = console_log::init_with_level(log::Level::Debug) {
        wasm_error!("Logger initialization failed: {}", e);
    }

    log::info!("Staff composer WASM module initialized");
}
