//! Cache-first request handling with network fallback.

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{OFFLINE_MESSAGE, OFFLINE_STATUS};
use crate::error::Result;
use crate::models::StoreIdentity;
use crate::network::{HttpRequest, HttpResponse, Network};
use crate::storage::{CacheStorage, Store};

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    /// An ok network response; `cached` is false when the write was skipped
    /// or failed.
    Network { cached: bool },
    /// A non-ok network response, returned as is.
    Passthrough,
    /// The synthetic connection-error response.
    Offline,
}

#[derive(Debug)]
pub struct Intercepted<R> {
    pub response: R,
    pub source: ResponseSource,
}

/// The response served when the network cannot be reached.
pub fn offline_response<R: HttpResponse>() -> Result<R> {
    R::plain_text(OFFLINE_STATUS, OFFLINE_MESSAGE)
}

/// Answer one request from the current store, falling back to the network.
///
/// Store failures never fail the request: a broken lookup is treated as a
/// miss and a broken write only skips caching.
pub async fn intercept<C, N>(
    caches: &C,
    network: &N,
    current: &StoreIdentity,
    request: &N::Request,
) -> Result<Intercepted<N::Response>>
where
    C: CacheStorage,
    N: Network<Request = <C::Store as Store>::Request, Response = <C::Store as Store>::Response>,
{
    let identity = request.identity();

    let store = match caches.open(current).await {
        Ok(store) => Some(store),
        Err(err) => {
            warn!("store {current} unavailable, going to network for {identity}: {err}");
            None
        }
    };

    if let Some(store) = &store {
        match store.lookup(request).await {
            Ok(Some(response)) => {
                debug!("cache hit for {identity}");
                return Ok(Intercepted {
                    response,
                    source: ResponseSource::Cache,
                });
            }
            Ok(None) => {}
            Err(err) => warn!("lookup for {identity} in {current} failed: {err}"),
        }
    }

    let response = match network.fetch(request).await {
        Ok(response) => response,
        Err(err) => {
            info!("serving offline response for {identity}: {err}");
            return Ok(Intercepted {
                response: offline_response()?,
                source: ResponseSource::Offline,
            });
        }
    };

    if !response.ok() {
        debug!("not caching {identity}: status {}", response.status());
        return Ok(Intercepted {
            response,
            source: ResponseSource::Passthrough,
        });
    }

    let cached = match &store {
        Some(store) if identity.is_cacheable() => write_copy(store, request, &response).await,
        _ => false,
    };

    Ok(Intercepted {
        response,
        source: ResponseSource::Network { cached },
    })
}

async fn write_copy<S: Store>(store: &S, request: &S::Request, response: &S::Response) -> bool {
    let written = match response.try_clone() {
        Ok(copy) => store.put(request, copy).await,
        Err(err) => Err(err),
    };
    match written {
        Ok(()) => true,
        Err(err) => {
            warn!("failed to cache {}: {err}", request.identity());
            false
        }
    }
}
