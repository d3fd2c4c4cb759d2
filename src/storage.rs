use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::Result;
use crate::models::{CacheEntry, RequestIdentity, ResponseSnapshot, StoreIdentity};
use crate::network::{HttpRequest, HttpResponse};

/// One named store mapping request identity to a response copy.
#[async_trait(?Send)]
pub trait Store {
    type Request: HttpRequest;
    type Response: HttpResponse;

    async fn lookup(&self, request: &Self::Request) -> Result<Option<Self::Response>>;

    /// Replace whatever entry exists for the request.
    async fn put(&self, request: &Self::Request, response: Self::Response) -> Result<()>;

    /// Returns whether an entry for the request existed.
    async fn delete(&self, request: &Self::Request) -> Result<bool>;
}

/// The host's registry of named stores.
#[async_trait(?Send)]
pub trait CacheStorage {
    type Store: Store;

    /// Open a store, creating it if absent.
    async fn open(&self, name: &StoreIdentity) -> Result<Self::Store>;

    async fn keys(&self) -> Result<Vec<StoreIdentity>>;

    /// Returns whether a store by that name existed.
    async fn delete(&self, name: &StoreIdentity) -> Result<bool>;
}

// ── In-memory backend ───────────────────────────────────────────

/// Cache storage kept in process memory, for native embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStorage {
    stores: Rc<RefCell<BTreeMap<StoreIdentity, MemoryStore>>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<RequestIdentity, ResponseSnapshot>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &StoreIdentity) -> bool {
        self.stores.borrow().contains_key(name)
    }

    pub fn store(&self, name: &StoreIdentity) -> Option<MemoryStore> {
        self.stores.borrow().get(name).cloned()
    }

    pub fn names(&self) -> Vec<StoreIdentity> {
        self.stores.borrow().keys().cloned().collect()
    }
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn get(&self, request: &RequestIdentity) -> Option<ResponseSnapshot> {
        self.entries.borrow().get(request).cloned()
    }

    pub fn entries(&self) -> Vec<CacheEntry> {
        self.entries
            .borrow()
            .iter()
            .map(|(request, response)| CacheEntry {
                request: request.clone(),
                response: response.clone(),
            })
            .collect()
    }
}

#[async_trait(?Send)]
impl Store for MemoryStore {
    type Request = RequestIdentity;
    type Response = ResponseSnapshot;

    async fn lookup(&self, request: &RequestIdentity) -> Result<Option<ResponseSnapshot>> {
        Ok(self.get(request))
    }

    async fn put(&self, request: &RequestIdentity, response: ResponseSnapshot) -> Result<()> {
        self.entries.borrow_mut().insert(request.clone(), response);
        Ok(())
    }

    async fn delete(&self, request: &RequestIdentity) -> Result<bool> {
        Ok(self.entries.borrow_mut().remove(request).is_some())
    }
}

#[async_trait(?Send)]
impl CacheStorage for MemoryCacheStorage {
    type Store = MemoryStore;

    async fn open(&self, name: &StoreIdentity) -> Result<MemoryStore> {
        Ok(self
            .stores
            .borrow_mut()
            .entry(name.clone())
            .or_default()
            .clone())
    }

    async fn keys(&self) -> Result<Vec<StoreIdentity>> {
        Ok(self.names())
    }

    async fn delete(&self, name: &StoreIdentity) -> Result<bool> {
        Ok(self.stores.borrow_mut().remove(name).is_some())
    }
}
