//! Offline cache service worker for the naybox web app.
//!
//! Install precaches a fixed manifest into the current store, activate
//! drops every other store, and each intercepted request is answered
//! cache-first with a network fallback and a plain-text 408 when offline.

use wasm_bindgen::prelude::*;

pub mod agent;
pub mod config;
pub mod error;
mod host;
pub mod intercept;
pub mod lifecycle;
mod logging;
pub mod models;
pub mod network;
pub mod storage;

#[cfg(test)]
mod testing;

pub use agent::{OfflineAgent, ServiceWorker};
pub use error::{Error, Result};

#[wasm_bindgen(start)]
pub fn start() -> std::result::Result<(), JsValue> {
    console_error_panic_hook::set_once();
    logging::init(log::LevelFilter::Info);
    host::register()?;
    Ok(())
}
