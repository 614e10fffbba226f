// SPDX-License-Identifier: MPL-2.0

//! Push delivery: the device subscription kept consistent between the
//! platform push service and the story API, plus inbound notification
//! handling.
//!
//! [`PushBridge`] is driven by a host that owns a real push service and
//! implements [`PushPlatform`] for it. The CLI has no push service, so it
//! only uses the payload and click handling.

mod bridge;
mod notification;

pub use bridge::{
    Permission, PlatformSubscription, PushBridge, PushPlatform, PushState,
    application_server_key,
};
pub use notification::{
    BrowserClients, ClickOutcome, Clients, NotificationAction, NotificationSpec, WindowClient,
    handle_notification_click, parse_push_payload,
};

use crate::api::ClientError;
use crate::state::SessionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("sign in to manage notifications")]
    NotAuthenticated,
    #[error("notification permission denied")]
    PermissionDenied,
    #[error("push service error: {0}")]
    Platform(String),
    #[error("push registration failed: {0}")]
    Remote(#[from] ClientError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid application server key: {0}")]
    InvalidKey(String),
    #[error("failed to open window: {0}")]
    Window(String),
}
