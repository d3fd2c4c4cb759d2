use async_trait::async_trait;
use log::{debug, info, warn};
use std::cell::Cell;

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::intercept::intercept;
use crate::lifecycle::{activate, install, Controls};
use crate::models::{ActivationReport, InstallReport, LifecyclePhase};
use crate::network::Network;
use crate::storage::{CacheStorage, Store};

/// The three hooks a host dispatches to the agent. Each returned future
/// must settle before the host considers the phase finished.
#[async_trait(?Send)]
pub trait ServiceWorker {
    type Request;
    type Response;

    async fn on_install(&self) -> Result<InstallReport>;

    async fn on_activate(&self) -> Result<ActivationReport>;

    async fn on_intercept(&self, request: &Self::Request) -> Result<Self::Response>;
}

pub struct OfflineAgent<C, N, H> {
    config: AgentConfig,
    caches: C,
    network: N,
    controls: H,
    phase: Cell<LifecyclePhase>,
}

impl<C, N, H> OfflineAgent<C, N, H> {
    pub fn new(config: AgentConfig, caches: C, network: N, controls: H) -> Self {
        Self {
            config,
            caches,
            network,
            controls,
            phase: Cell::new(LifecyclePhase::Installing),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase.get()
    }

    fn advance(&self, next: LifecyclePhase) -> Result<()> {
        let current = self.phase.get();
        if !current.can_advance_to(next) {
            return Err(Error::Lifecycle {
                from: current,
                to: next,
            });
        }
        debug!("lifecycle {} -> {}", current.as_str(), next.as_str());
        self.phase.set(next);
        Ok(())
    }
}

#[async_trait(?Send)]
impl<C, N, H> ServiceWorker for OfflineAgent<C, N, H>
where
    C: CacheStorage,
    N: Network<Request = <C::Store as Store>::Request, Response = <C::Store as Store>::Response>,
    H: Controls,
{
    type Request = N::Request;
    type Response = N::Response;

    async fn on_install(&self) -> Result<InstallReport> {
        let phase = self.phase.get();
        if phase != LifecyclePhase::Installing {
            return Err(Error::Lifecycle {
                from: phase,
                to: LifecyclePhase::Installing,
            });
        }

        let report = install(&self.caches, &self.network, &self.config).await?;
        info!(
            "install complete: {}",
            serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string())
        );

        if let Err(err) = self.controls.skip_waiting().await {
            warn!("skip waiting failed: {err}");
        }
        Ok(report)
    }

    async fn on_activate(&self) -> Result<ActivationReport> {
        let previous = self.phase.get();
        self.advance(LifecyclePhase::Activating)?;
        let report = match activate(&self.caches, &self.controls, &self.config.store).await {
            Ok(report) => report,
            Err(err) => {
                // Let a later activate event retry.
                self.phase.set(previous);
                return Err(err);
            }
        };
        self.advance(LifecyclePhase::Active)?;
        info!(
            "activation complete: {}",
            serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string())
        );
        Ok(report)
    }

    async fn on_intercept(&self, request: &Self::Request) -> Result<Self::Response> {
        let outcome = intercept(&self.caches, &self.network, &self.config.store, request).await?;
        debug!(
            "intercepted: {}",
            serde_json::to_string(&outcome.source).unwrap_or_default()
        );
        Ok(outcome.response)
    }
}
