// SPDX-License-Identifier: MPL-2.0

//! The interception point in front of the network.
//!
//! `CacheLayer` wraps a [`Fetch`] and is one itself. Once activated it sorts
//! every first-party request into one of two policies:
//! - static assets are cache-first, filling the runtime cache on a 200
//! - API calls (path contains the API version segment) are network-first,
//!   mirroring 2xx GETs into the runtime cache and falling back to it
//!
//! Either policy answers with the offline placeholder instead of an error.

use crate::cache::offline::offline_response;
use crate::cache::{CacheError, CacheStorage};
use crate::config::{API_PATH_SEGMENT, CACHE_NAME, RUNTIME_CACHE};
use crate::net::{Fetch, FetchError, Method, Request, Response, StatusCode};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::{Origin, Url};

/// Install/activate lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created, nothing cached yet
    Parsed,
    Installing,
    /// Manifest fully cached, waiting for activation
    Installed,
    /// Intercepting requests
    Activated,
    /// Install failed; never serves anything
    Redundant,
}

/// How a request will be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Left to the network untouched
    Passthrough,
    CacheFirst,
    NetworkFirst,
}

/// Broadcast when the layer takes control of open instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerChange {
    pub version: String,
}

/// First-party origins; anything else is cross-origin and never intercepted
#[derive(Debug, Clone)]
pub struct Scope {
    origins: Vec<Origin>,
}

impl Scope {
    pub fn new(shell: &Url, api: &Url) -> Self {
        let mut origins = vec![shell.origin()];
        if api.origin() != shell.origin() {
            origins.push(api.origin());
        }
        Self { origins }
    }

    pub fn contains(&self, url: &Url) -> bool {
        let origin = url.origin();
        self.origins.iter().any(|o| *o == origin)
    }
}

pub struct CacheLayer<F> {
    network: F,
    storage: CacheStorage,
    scope: Scope,
    state: Mutex<Lifecycle>,
    controller: broadcast::Sender<ControllerChange>,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

impl<F: Fetch> CacheLayer<F> {
    /// Resumes as Activated when the current version was activated before
    pub fn new(network: F, storage: CacheStorage, scope: Scope) -> Self {
        let state = match storage.active_version() {
            Ok(Some(version)) if version == CACHE_NAME => Lifecycle::Activated,
            Ok(_) => Lifecycle::Parsed,
            Err(e) => {
                warn!("failed to read active cache version: {}", e);
                Lifecycle::Parsed
            }
        };
        debug!(?state, "cache layer created");

        let (controller, _) = broadcast::channel(8);

        Self {
            network,
            storage,
            scope,
            state: Mutex::new(state),
            controller,
            pending_writes: Mutex::new(Vec::new()),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.state.lock()
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn subscribe_controller(&self) -> broadcast::Receiver<ControllerChange> {
        self.controller.subscribe()
    }

    /// Cache every manifest entry into the asset cache, or nothing at all.
    ///
    /// Any fetch failure or non-200 response aborts the install and leaves the
    /// layer Redundant.
    pub async fn install(&self, manifest: &[Url]) -> Result<(), CacheError> {
        *self.state.lock() = Lifecycle::Installing;
        info!(assets = manifest.len(), "installing asset cache");

        let mut entries = Vec::with_capacity(manifest.len());
        for url in manifest {
            let outcome = self.network.fetch(Request::get(url.clone())).await;
            let response = match outcome {
                Ok(response) if response.status() == StatusCode::OK => response,
                Ok(response) => {
                    return Err(self.abort_install(url, format!("status {}", response.status())));
                }
                Err(e) => return Err(self.abort_install(url, e.to_string())),
            };
            entries.push((url.clone(), response));
        }

        if let Err(e) = self.storage.put_all(CACHE_NAME, &entries) {
            *self.state.lock() = Lifecycle::Redundant;
            return Err(e);
        }

        *self.state.lock() = Lifecycle::Installed;
        info!("asset cache installed");
        Ok(())
    }

    fn abort_install(&self, url: &Url, reason: String) -> CacheError {
        warn!(%url, %reason, "install aborted");
        *self.state.lock() = Lifecycle::Redundant;
        CacheError::Install {
            url: url.to_string(),
            reason,
        }
    }

    /// Purge caches from other versions and take control.
    ///
    /// Returns the names of the deleted caches.
    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        let current = self.lifecycle();
        if current != Lifecycle::Installed {
            return Err(CacheError::NotInstalled(current));
        }

        let mut deleted = Vec::new();
        for name in self.storage.keys()? {
            if name != CACHE_NAME && name != RUNTIME_CACHE {
                info!(cache = %name, "deleting old cache");
                self.storage.delete(&name)?;
                deleted.push(name);
            }
        }

        self.storage.set_active_version(CACHE_NAME)?;
        *self.state.lock() = Lifecycle::Activated;

        // No receivers is fine: nobody is listening yet
        let _ = self.controller.send(ControllerChange {
            version: CACHE_NAME.to_string(),
        });
        info!(version = CACHE_NAME, "cache layer activated");

        Ok(deleted)
    }

    pub fn classify(&self, request: &Request) -> Policy {
        if self.lifecycle() != Lifecycle::Activated || !self.scope.contains(&request.url) {
            Policy::Passthrough
        } else if request.url.path().contains(API_PATH_SEGMENT) {
            Policy::NetworkFirst
        } else {
            Policy::CacheFirst
        }
    }

    /// Wait for background cache writes to finish
    pub async fn settle(&self) {
        let handles = std::mem::take(&mut *self.pending_writes.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("cache write task failed: {}", e);
            }
        }
    }

    /// Fire-and-forget write into the runtime cache
    fn store_in_background(&self, url: Url, response: Response) {
        let storage = self.storage.clone();
        let handle = tokio::task::spawn_blocking(move || {
            if let Err(e) = storage.put(RUNTIME_CACHE, &url, &response) {
                warn!(%url, "failed to cache response: {}", e);
            }
        });

        let mut pending = self.pending_writes.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    fn lookup(&self, url: &Url) -> Option<Response> {
        match self.storage.match_any(url) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(%url, "cache lookup failed: {}", e);
                None
            }
        }
    }

    async fn cache_first(&self, request: Request) -> Response {
        let url = request.url.clone();
        let cacheable = request.method == Method::GET;

        if cacheable && let Some(hit) = self.lookup(&url) {
            debug!(%url, "cache hit");
            return hit;
        }
        debug!(%url, "cache miss");

        match self.network.fetch(request).await {
            Ok(response) => {
                if cacheable && response.status() == StatusCode::OK {
                    self.store_in_background(url, response.duplicate());
                }
                response
            }
            Err(e) => {
                debug!(%url, "asset fetch failed, serving offline page: {}", e);
                offline_response()
            }
        }
    }

    async fn network_first(&self, request: Request) -> Response {
        let url = request.url.clone();
        let cacheable = request.method == Method::GET;

        match self.network.fetch(request).await {
            Ok(response) => {
                if cacheable && response.is_ok() {
                    self.store_in_background(url, response.duplicate());
                }
                response
            }
            Err(e) => {
                warn!(%url, "network failed, trying runtime cache: {}", e);
                let fallback = if cacheable { self.lookup(&url) } else { None };
                fallback.unwrap_or_else(offline_response)
            }
        }
    }
}

impl<F: Fetch> Fetch for CacheLayer<F> {
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        match self.classify(&request) {
            Policy::Passthrough => self.network.fetch(request).await,
            Policy::CacheFirst => Ok(self.cache_first(request).await),
            Policy::NetworkFirst => Ok(self.network_first(request).await),
        }
    }
}
