// SPDX-License-Identifier: MPL-2.0

use crate::api::{PushKeys, PushSubscriptionPayload, StoryClient};
use crate::config::VAPID_PUBLIC_KEY;
use crate::net::Fetch;
use crate::push::PushError;
use crate::state::{SessionGate, SubscriptionMarker};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Not asked yet
    Default,
    Granted,
    Denied,
}

/// A subscription as the platform push service hands it out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSubscription {
    pub endpoint: String,
    pub p256dh: Vec<u8>,
    pub auth: Vec<u8>,
}

impl PlatformSubscription {
    pub fn to_payload(&self) -> PushSubscriptionPayload {
        PushSubscriptionPayload {
            endpoint: self.endpoint.clone(),
            keys: PushKeys {
                p256dh: STANDARD.encode(&self.p256dh),
                auth: STANDARD.encode(&self.auth),
            },
        }
    }
}

/// The platform push service and its permission prompt
pub trait PushPlatform: Send + Sync {
    fn permission(&self) -> Permission;

    fn request_permission(&self) -> impl Future<Output = Permission> + Send;

    fn subscription(
        &self,
    ) -> impl Future<Output = Result<Option<PlatformSubscription>, PushError>> + Send;

    fn subscribe(
        &self,
        application_server_key: &[u8],
    ) -> impl Future<Output = Result<PlatformSubscription, PushError>> + Send;

    fn unsubscribe(
        &self,
        subscription: &PlatformSubscription,
    ) -> impl Future<Output = Result<(), PushError>> + Send;
}

impl<P: PushPlatform> PushPlatform for Arc<P> {
    fn permission(&self) -> Permission {
        (**self).permission()
    }

    fn request_permission(&self) -> impl Future<Output = Permission> + Send {
        (**self).request_permission()
    }

    fn subscription(
        &self,
    ) -> impl Future<Output = Result<Option<PlatformSubscription>, PushError>> + Send {
        (**self).subscription()
    }

    fn subscribe(
        &self,
        application_server_key: &[u8],
    ) -> impl Future<Output = Result<PlatformSubscription, PushError>> + Send {
        (**self).subscribe(application_server_key)
    }

    fn unsubscribe(
        &self,
        subscription: &PlatformSubscription,
    ) -> impl Future<Output = Result<(), PushError>> + Send {
        (**self).unsubscribe(subscription)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushState {
    Unsubscribed,
    Subscribed { endpoint: String },
}

/// Raw bytes of the fixed application server key
pub fn application_server_key() -> Result<Vec<u8>, PushError> {
    URL_SAFE_NO_PAD
        .decode(VAPID_PUBLIC_KEY.trim_end_matches('='))
        .map_err(|e| PushError::InvalidKey(e.to_string()))
}

pub struct PushBridge<F, P> {
    client: Arc<StoryClient<F>>,
    platform: P,
    session: Arc<SessionGate>,
}

impl<F: Fetch, P: PushPlatform> PushBridge<F, P> {
    pub fn new(client: Arc<StoryClient<F>>, platform: P, session: Arc<SessionGate>) -> Self {
        Self {
            client,
            platform,
            session,
        }
    }

    pub fn state(&self) -> PushState {
        match self.session.subscription() {
            Some(marker) if marker.is_active => PushState::Subscribed {
                endpoint: marker.endpoint,
            },
            _ => PushState::Unsubscribed,
        }
    }

    /// Local state turns Subscribed only once the API has the subscription
    pub async fn subscribe(&self) -> Result<PushState, PushError> {
        let token = self.session.token().ok_or(PushError::NotAuthenticated)?;
        self.ensure_permission().await?;

        let (subscription, created) = match self.platform.subscription().await? {
            Some(existing) => (existing, false),
            None => {
                let key = application_server_key()?;
                (self.platform.subscribe(&key).await?, true)
            }
        };

        if let Err(e) = self
            .client
            .subscribe_push(&token, &subscription.to_payload())
            .await
        {
            if created && let Err(teardown) = self.platform.unsubscribe(&subscription).await {
                warn!("failed to drop unregistered subscription: {}", teardown);
            }
            return Err(e.into());
        }

        self.session.set_subscription(&SubscriptionMarker {
            endpoint: subscription.endpoint.clone(),
            is_active: true,
        })?;
        info!(endpoint = %subscription.endpoint, "push subscribed");

        Ok(PushState::Subscribed {
            endpoint: subscription.endpoint,
        })
    }

    /// The API forgets the subscription before the platform does
    pub async fn unsubscribe(&self) -> Result<PushState, PushError> {
        let token = self.session.token().ok_or(PushError::NotAuthenticated)?;

        if let Some(subscription) = self.platform.subscription().await? {
            self.client
                .unsubscribe_push(&token, &subscription.endpoint)
                .await?;
            self.platform.unsubscribe(&subscription).await?;
            info!(endpoint = %subscription.endpoint, "push unsubscribed");
        }

        self.session.clear_subscription();
        Ok(PushState::Unsubscribed)
    }

    pub async fn toggle(&self) -> Result<PushState, PushError> {
        match self.state() {
            PushState::Subscribed { .. } => self.unsubscribe().await,
            PushState::Unsubscribed => self.subscribe().await,
        }
    }

    async fn ensure_permission(&self) -> Result<(), PushError> {
        let permission = match self.platform.permission() {
            Permission::Default => self.platform.request_permission().await,
            settled => settled,
        };

        if permission == Permission::Granted {
            Ok(())
        } else {
            Err(PushError::PermissionDenied)
        }
    }
}
