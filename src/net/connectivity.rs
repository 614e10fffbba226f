// SPDX-License-Identifier: MPL-2.0

use crate::net::{Fetch, Method, Request, ResponseSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};
use url::Url;

/// Online/offline state shared between the shell and the sync reconciler.
#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the current state. Subscribers only wake on actual transitions.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "connectivity changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolve true as soon as we are online, false if `timeout` passes first.
    pub async fn wait_for_online(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|online| *online)).await {
            Ok(Ok(_)) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                debug!(?timeout, "gave up waiting for connectivity");
                false
            }
        }
    }
}

/// Any real response from `url` counts as online, whatever its status.
pub async fn probe(fetcher: &impl Fetch, url: &Url) -> bool {
    matches!(
        fetcher.fetch(Request::new(Method::HEAD, url.clone())).await,
        Ok(response) if response.source() != ResponseSource::Offline
    )
}
