//! Browser bindings: the `ServiceWorkerGlobalScope` events, Cache Storage
//! and `fetch`, wired to an [`OfflineAgent`].

use async_trait::async_trait;
use js_sys::{Array, Function, Promise, Reflect};
use log::warn;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::{ExtendableEvent, FetchEvent, Headers, ResponseInit, ServiceWorkerGlobalScope};

use crate::agent::{OfflineAgent, ServiceWorker};
use crate::config::{AgentConfig, TEXT_PLAIN};
use crate::error::{describe, Error, Result};
use crate::lifecycle::Controls;
use crate::models::{RequestIdentity, StoreIdentity};
use crate::network::{HttpRequest, HttpResponse, Network};
use crate::storage::{CacheStorage, Store};

const NAVIGATION_PRELOAD: &str = "navigationPreload";
const PRELOAD_RESPONSE: &str = "preloadResponse";

/// An intercepted or precache request, plus the navigation preload the
/// host may already have started for it.
pub struct FetchRequest {
    inner: web_sys::Request,
    preload: Option<Promise>,
}

impl FetchRequest {
    fn new(inner: web_sys::Request) -> Self {
        Self {
            inner,
            preload: None,
        }
    }

    fn from_event(event: &FetchEvent) -> Self {
        let preload = Reflect::get(event, &JsValue::from_str(PRELOAD_RESPONSE))
            .ok()
            .and_then(|value| value.dyn_into::<Promise>().ok());
        Self {
            inner: event.request(),
            preload,
        }
    }
}

impl HttpRequest for FetchRequest {
    fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(self.inner.method(), self.inner.url())
    }
}

impl HttpResponse for web_sys::Response {
    fn status(&self) -> u16 {
        web_sys::Response::status(self)
    }

    fn ok(&self) -> bool {
        web_sys::Response::ok(self)
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(web_sys::Response::clone(self)?)
    }

    fn plain_text(status: u16, body: &str) -> Result<Self> {
        let headers = Headers::new()?;
        headers.set("Content-Type", TEXT_PLAIN)?;
        let init = ResponseInit::new();
        init.set_status(status);
        init.set_headers(&headers);
        Ok(web_sys::Response::new_with_opt_str_and_init(
            Some(body),
            &init,
        )?)
    }
}

// ── Cache Storage ───────────────────────────────────────────────

pub struct BrowserCaches {
    caches: web_sys::CacheStorage,
}

pub struct BrowserStore {
    name: StoreIdentity,
    cache: web_sys::Cache,
}

impl BrowserStore {
    fn failed(&self, err: JsValue) -> Error {
        Error::Store {
            store: self.name.to_string(),
            reason: describe(&err),
        }
    }
}

#[async_trait(?Send)]
impl Store for BrowserStore {
    type Request = FetchRequest;
    type Response = web_sys::Response;

    async fn lookup(&self, request: &FetchRequest) -> Result<Option<web_sys::Response>> {
        let found = JsFuture::from(self.cache.match_with_request(&request.inner))
            .await
            .map_err(|err| self.failed(err))?;
        if found.is_undefined() {
            return Ok(None);
        }
        Ok(Some(found.dyn_into()?))
    }

    async fn put(&self, request: &FetchRequest, response: web_sys::Response) -> Result<()> {
        JsFuture::from(self.cache.put_with_request(&request.inner, &response))
            .await
            .map_err(|err| self.failed(err))?;
        Ok(())
    }

    async fn delete(&self, request: &FetchRequest) -> Result<bool> {
        let existed = JsFuture::from(self.cache.delete_with_request(&request.inner))
            .await
            .map_err(|err| self.failed(err))?;
        Ok(existed.as_bool().unwrap_or(false))
    }
}

#[async_trait(?Send)]
impl CacheStorage for BrowserCaches {
    type Store = BrowserStore;

    async fn open(&self, name: &StoreIdentity) -> Result<BrowserStore> {
        let cache = JsFuture::from(self.caches.open(name.as_str()))
            .await
            .map_err(|err| Error::Store {
                store: name.to_string(),
                reason: describe(&err),
            })?;
        Ok(BrowserStore {
            name: name.clone(),
            cache: cache.dyn_into()?,
        })
    }

    async fn keys(&self) -> Result<Vec<StoreIdentity>> {
        let names: Array = JsFuture::from(self.caches.keys()).await?.dyn_into()?;
        Ok(names
            .iter()
            .filter_map(|name| name.as_string())
            .map(StoreIdentity::new)
            .collect())
    }

    async fn delete(&self, name: &StoreIdentity) -> Result<bool> {
        let existed = JsFuture::from(self.caches.delete(name.as_str()))
            .await
            .map_err(|err| Error::Store {
                store: name.to_string(),
                reason: describe(&err),
            })?;
        Ok(existed.as_bool().unwrap_or(false))
    }
}

// ── Network ─────────────────────────────────────────────────────

pub struct BrowserNetwork {
    global: ServiceWorkerGlobalScope,
}

#[async_trait(?Send)]
impl Network for BrowserNetwork {
    type Request = FetchRequest;
    type Response = web_sys::Response;

    fn request(&self, url: &str) -> Result<FetchRequest> {
        Ok(FetchRequest::new(web_sys::Request::new_with_str(url)?))
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<web_sys::Response> {
        let url = request.inner.url();
        let no_response = |err: JsValue| Error::Network {
            url: url.clone(),
            reason: describe(&err),
        };

        // Navigations may already be in flight; reuse that response.
        if let Some(preload) = &request.preload {
            let preloaded = JsFuture::from(preload.clone()).await.map_err(no_response)?;
            if !preloaded.is_undefined() {
                return Ok(preloaded.dyn_into()?);
            }
        }

        let response = JsFuture::from(self.global.fetch_with_request(&request.inner))
            .await
            .map_err(no_response)?;
        Ok(response.dyn_into()?)
    }
}

// ── Lifecycle controls ──────────────────────────────────────────

pub struct BrowserControls {
    global: ServiceWorkerGlobalScope,
}

#[async_trait(?Send)]
impl Controls for BrowserControls {
    async fn skip_waiting(&self) -> Result<()> {
        JsFuture::from(self.global.skip_waiting()?).await?;
        Ok(())
    }

    async fn claim_clients(&self) -> Result<()> {
        JsFuture::from(self.global.clients().claim()).await?;
        Ok(())
    }

    async fn enable_navigation_preload(&self) -> Result<bool> {
        let registration = self.global.registration();
        let key = JsValue::from_str(NAVIGATION_PRELOAD);
        if !Reflect::has(&registration, &key)? {
            return Ok(false);
        }
        let manager = Reflect::get(&registration, &key)?;
        let enable: Function = Reflect::get(&manager, &JsValue::from_str("enable"))?.dyn_into()?;
        let pending: Promise = enable.call0(&manager)?.dyn_into()?;
        JsFuture::from(pending).await?;
        Ok(true)
    }
}

// ── Event wiring ────────────────────────────────────────────────

type BrowserAgent = OfflineAgent<BrowserCaches, BrowserNetwork, BrowserControls>;

/// Attach install, activate and fetch handlers to the worker global scope.
pub fn register() -> Result<()> {
    let global: ServiceWorkerGlobalScope = js_sys::global()
        .dyn_into()
        .map_err(|_| Error::Host("not running in a service worker scope".to_string()))?;
    let agent: Rc<BrowserAgent> = Rc::new(OfflineAgent::new(
        AgentConfig::embedded()?,
        BrowserCaches {
            caches: global.caches()?,
        },
        BrowserNetwork {
            global: global.clone(),
        },
        BrowserControls {
            global: global.clone(),
        },
    ));

    let installing = Rc::clone(&agent);
    let on_install = Closure::<dyn Fn(ExtendableEvent)>::new(move |event: ExtendableEvent| {
        let agent = Rc::clone(&installing);
        let done = future_to_promise(async move {
            agent.on_install().await?;
            Ok(JsValue::UNDEFINED)
        });
        if let Err(err) = event.wait_until(&done) {
            warn!("install waitUntil rejected: {}", describe(&err));
        }
    });
    global.set_oninstall(Some(on_install.as_ref().unchecked_ref()));
    on_install.forget();

    let activating = Rc::clone(&agent);
    let on_activate = Closure::<dyn Fn(ExtendableEvent)>::new(move |event: ExtendableEvent| {
        let agent = Rc::clone(&activating);
        let done = future_to_promise(async move {
            agent.on_activate().await?;
            Ok(JsValue::UNDEFINED)
        });
        if let Err(err) = event.wait_until(&done) {
            warn!("activate waitUntil rejected: {}", describe(&err));
        }
    });
    global.set_onactivate(Some(on_activate.as_ref().unchecked_ref()));
    on_activate.forget();

    let intercepting = agent;
    let on_fetch = Closure::<dyn Fn(FetchEvent)>::new(move |event: FetchEvent| {
        let agent = Rc::clone(&intercepting);
        let request = FetchRequest::from_event(&event);
        if let Some(preload) = &request.preload {
            // Keep the preload alive even when the cache answers first.
            if let Err(err) = event.wait_until(preload) {
                warn!("preload waitUntil rejected: {}", describe(&err));
            }
        }
        let response = future_to_promise(async move {
            let response = agent.on_intercept(&request).await?;
            Ok(response.into())
        });
        if let Err(err) = event.respond_with(&response) {
            warn!("respondWith rejected: {}", describe(&err));
        }
    });
    global.set_onfetch(Some(on_fetch.as_ref().unchecked_ref()));
    on_fetch.forget();

    Ok(())
}
