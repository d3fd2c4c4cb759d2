use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::StoreIdentity;

/// Status of the response served when the network cannot be reached.
pub const OFFLINE_STATUS: u16 = 408;
pub const OFFLINE_MESSAGE: &str = "Erro de conexão. Por favor, verifique sua internet.";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

const PRECACHE_JSON: &str = include_str!("precache.json");

/// Store name and precache manifest, compiled into the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub store: StoreIdentity,
    pub manifest: Vec<String>,
}

impl AgentConfig {
    pub fn new(store: impl Into<String>, manifest: Vec<String>) -> Result<Self> {
        let config = Self {
            store: StoreIdentity::new(store),
            manifest,
        };
        config.validate()?;
        Ok(config)
    }

    /// The configuration shipped in `precache.json`.
    pub fn embedded() -> Result<Self> {
        Self::from_json(PRECACHE_JSON)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: AgentConfig = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid precache manifest: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.store.as_str().trim().is_empty() {
            return Err(Error::Config("store name must not be empty".to_string()));
        }
        // The host rejects a batch that names the same request twice.
        let mut seen = HashSet::new();
        for entry in &self.manifest {
            if entry.trim().is_empty() {
                return Err(Error::Config("manifest entries must not be empty".to_string()));
            }
            if !seen.insert(entry.as_str()) {
                return Err(Error::Config(format!("duplicate manifest entry {entry}")));
            }
        }
        Ok(())
    }
}
