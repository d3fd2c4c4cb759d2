use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

use crate::models::LifecyclePhase;

#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (offline, DNS, CORS rejection).
    #[error("network request for {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("store {store} failed: {reason}")]
    Store { store: String, reason: String },

    /// A call into the hosting runtime threw.
    #[error("host call failed: {0}")]
    Host(String),

    #[error("install of {store} failed: {reason}")]
    InstallFailed { store: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot move from {} to {}", from.as_str(), to.as_str())]
    Lifecycle {
        from: LifecyclePhase,
        to: LifecyclePhase,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<JsValue> for Error {
    fn from(value: JsValue) -> Self {
        Error::Host(describe(&value))
    }
}

impl From<Error> for JsValue {
    fn from(err: Error) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

/// Render a thrown JS value for logs and error messages.
pub(crate) fn describe(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
