//! Install-time warm-up and activation-time garbage collection.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use log::{debug, warn};

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::models::{ActivationReport, InstallReport, StoreIdentity};
use crate::network::{HttpRequest, HttpResponse, Network};
use crate::storage::{CacheStorage, Store};

/// Lifecycle switches exposed by the hosting runtime.
#[async_trait(?Send)]
pub trait Controls {
    /// Become eligible for activation without waiting for old clients to close.
    async fn skip_waiting(&self) -> Result<()>;

    /// Take control of every open client in scope.
    async fn claim_clients(&self) -> Result<()>;

    /// Returns `false` when the host has no navigation preload support.
    async fn enable_navigation_preload(&self) -> Result<bool>;
}

/// Fetch every manifest entry and write it to the current store.
///
/// All fetches settle before the first write, and a write failure removes
/// the entries written before it, so a failed install adds no entries. A
/// non-ok response fails the install just like a network error.
pub async fn install<C, N>(caches: &C, network: &N, config: &AgentConfig) -> Result<InstallReport>
where
    C: CacheStorage,
    N: Network<Request = <C::Store as Store>::Request, Response = <C::Store as Store>::Response>,
{
    let failed = |reason: String| Error::InstallFailed {
        store: config.store.to_string(),
        reason,
    };

    let store = caches.open(&config.store).await?;
    let requests = config
        .manifest
        .iter()
        .map(|url| network.request(url))
        .collect::<Result<Vec<_>>>()?;

    let responses = try_join_all(requests.iter().map(|request| fetch_ok(network, request)))
        .await
        .map_err(|err| failed(err.to_string()))?;

    let mut written = 0;
    for (request, response) in requests.iter().zip(responses) {
        if let Err(err) = store.put(request, response).await {
            rollback(&store, &requests[..written]).await;
            return Err(failed(err.to_string()));
        }
        written += 1;
    }

    Ok(InstallReport {
        store: config.store.clone(),
        cached: requests.len(),
    })
}

/// Remove entries a failed install already wrote.
async fn rollback<S: Store>(store: &S, written: &[S::Request]) {
    for request in written {
        if let Err(err) = store.delete(request).await {
            warn!("failed to roll back {}: {err}", request.identity());
        }
    }
}

async fn fetch_ok<N: Network>(network: &N, request: &N::Request) -> Result<N::Response> {
    let response = network.fetch(request).await?;
    if !response.ok() {
        return Err(Error::Network {
            url: request.identity().url,
            reason: format!("unexpected status {}", response.status()),
        });
    }
    debug!("precached {}", request.identity());
    Ok(response)
}

/// Delete every store but `current`, then enable navigation preload and
/// claim clients.
///
/// A store that fails to delete is logged and reported; it does not block
/// activation.
pub async fn activate<C, H>(caches: &C, controls: &H, current: &StoreIdentity) -> Result<ActivationReport>
where
    C: CacheStorage,
    H: Controls,
{
    let mut report = ActivationReport::new(current.clone());

    for name in caches.keys().await? {
        if &name == current {
            continue;
        }
        match caches.delete(&name).await {
            Ok(true) => report.deleted.push(name),
            Ok(false) => debug!("store {name} was already gone"),
            Err(err) => {
                warn!("failed to delete stale store {name}: {err}");
                report.failed.push(name);
            }
        }
    }

    report.navigation_preload = match controls.enable_navigation_preload().await {
        Ok(enabled) => enabled,
        Err(err) => {
            warn!("navigation preload not enabled: {err}");
            false
        }
    };

    if let Err(err) = controls.claim_clients().await {
        warn!("failed to claim clients: {err}");
    }

    Ok(report)
}
