//! Scripted host doubles shared by the unit tests.

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::lifecycle::Controls;
use crate::models::{RequestIdentity, ResponseSnapshot, StoreIdentity};
use crate::network::Network;
use crate::storage::{CacheStorage, MemoryCacheStorage, MemoryStore, Store};

/// Network that answers routed URLs and fails every other request.
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    routes: HashMap<String, ResponseSnapshot>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), ResponseSnapshot::new(status, body));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

#[async_trait(?Send)]
impl Network for ScriptedNetwork {
    type Request = RequestIdentity;
    type Response = ResponseSnapshot;

    fn request(&self, url: &str) -> Result<RequestIdentity> {
        Ok(RequestIdentity::get(url))
    }

    async fn fetch(&self, request: &RequestIdentity) -> Result<ResponseSnapshot> {
        self.calls.borrow_mut().push(request.url.clone());
        self.routes
            .get(&request.url)
            .cloned()
            .ok_or_else(|| Error::Network {
                url: request.url.clone(),
                reason: "connection refused".to_string(),
            })
    }
}

#[derive(Debug, Default)]
pub struct RecordingControls {
    pub navigation_preload_supported: bool,
    pub fail_navigation_preload: bool,
    pub fail_skip_waiting: bool,
    pub fail_claim: bool,
    pub skipped_waiting: Cell<u32>,
    pub claimed: Cell<u32>,
    pub preload_enabled: Cell<bool>,
}

impl RecordingControls {
    pub fn with_navigation_preload() -> Self {
        Self {
            navigation_preload_supported: true,
            ..Self::default()
        }
    }
}

#[async_trait(?Send)]
impl Controls for RecordingControls {
    async fn skip_waiting(&self) -> Result<()> {
        self.skipped_waiting.set(self.skipped_waiting.get() + 1);
        if self.fail_skip_waiting {
            return Err(Error::Host("skipWaiting rejected".to_string()));
        }
        Ok(())
    }

    async fn claim_clients(&self) -> Result<()> {
        self.claimed.set(self.claimed.get() + 1);
        if self.fail_claim {
            return Err(Error::Host("clients.claim rejected".to_string()));
        }
        Ok(())
    }

    async fn enable_navigation_preload(&self) -> Result<bool> {
        if self.fail_navigation_preload {
            return Err(Error::Host("navigationPreload.enable rejected".to_string()));
        }
        if self.navigation_preload_supported {
            self.preload_enabled.set(true);
        }
        Ok(self.navigation_preload_supported)
    }
}

/// Memory storage that can reject listing, lookups, or every write after
/// the first `puts_allowed`.
#[derive(Debug, Clone, Default)]
pub struct FaultyCaches {
    pub inner: MemoryCacheStorage,
    pub fail_keys: bool,
    pub fail_lookup: bool,
    pub puts_allowed: Option<usize>,
    pub(crate) puts: Rc<Cell<usize>>,
}

impl FaultyCaches {
    pub fn failing_lookups(inner: MemoryCacheStorage) -> Self {
        Self {
            inner,
            fail_lookup: true,
            ..Self::default()
        }
    }

    pub fn failing_puts_after(inner: MemoryCacheStorage, allowed: usize) -> Self {
        Self {
            inner,
            puts_allowed: Some(allowed),
            ..Self::default()
        }
    }
}

pub struct FaultyStore {
    name: StoreIdentity,
    inner: MemoryStore,
    fail_lookup: bool,
    puts_allowed: Option<usize>,
    puts: Rc<Cell<usize>>,
}

impl FaultyStore {
    fn failed(&self, reason: &str) -> Error {
        Error::Store {
            store: self.name.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl Store for FaultyStore {
    type Request = RequestIdentity;
    type Response = ResponseSnapshot;

    async fn lookup(&self, request: &RequestIdentity) -> Result<Option<ResponseSnapshot>> {
        if self.fail_lookup {
            return Err(self.failed("lookup rejected"));
        }
        self.inner.lookup(request).await
    }

    async fn put(&self, request: &RequestIdentity, response: ResponseSnapshot) -> Result<()> {
        let done = self.puts.get();
        if self.puts_allowed.is_some_and(|allowed| done >= allowed) {
            return Err(self.failed("quota exceeded"));
        }
        self.puts.set(done + 1);
        self.inner.put(request, response).await
    }

    async fn delete(&self, request: &RequestIdentity) -> Result<bool> {
        self.inner.delete(request).await
    }
}

#[async_trait(?Send)]
impl CacheStorage for FaultyCaches {
    type Store = FaultyStore;

    async fn open(&self, name: &StoreIdentity) -> Result<FaultyStore> {
        Ok(FaultyStore {
            name: name.clone(),
            inner: self.inner.open(name).await?,
            fail_lookup: self.fail_lookup,
            puts_allowed: self.puts_allowed,
            puts: Rc::clone(&self.puts),
        })
    }

    async fn keys(&self) -> Result<Vec<StoreIdentity>> {
        if self.fail_keys {
            return Err(Error::Host("keys rejected".to_string()));
        }
        self.inner.keys().await
    }

    async fn delete(&self, name: &StoreIdentity) -> Result<bool> {
        self.inner.delete(name).await
    }
}
