//! Funder WASM frontend binding.
//!
//! The page keeps its own markup; this crate owns the wallet, the contract
//! and the state, and hands the page a [`FunderApp`].

pub mod app;
pub mod ethereum;

pub use app::{FunderApp, UPDATE_EVENT};

use wasm_bindgen::prelude::*;

/// WASM entry point – called automatically when the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() {
    // Improve panic messages in the browser console
    console_error_panic_hook::set_once();
}
