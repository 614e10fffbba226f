// SPDX-License-Identifier: MPL-2.0

use crate::config::{APP_NAME, NOTIFICATION_ICON, NOTIFICATION_TAG};
use crate::push::PushError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

const DEFAULT_BODY: &str = "You have a new notification";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// What to show for one inbound push message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSpec {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
}

#[derive(Deserialize)]
struct PushPayload {
    title: Option<String>,
    options: Option<PushOptions>,
}

#[derive(Deserialize)]
struct PushOptions {
    body: Option<String>,
}

/// Never fails: an absent or malformed payload gets the generic notification
pub fn parse_push_payload(data: Option<&[u8]>) -> NotificationSpec {
    let payload = data.and_then(|bytes| match serde_json::from_slice::<PushPayload>(bytes) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("unreadable push payload: {}", e);
            None
        }
    });

    let (title, body) = match payload {
        Some(payload) => (
            payload.title,
            payload.options.and_then(|options| options.body),
        ),
        None => (None, None),
    };

    NotificationSpec {
        title: non_empty(title).unwrap_or_else(|| APP_NAME.to_string()),
        body: non_empty(body).unwrap_or_else(|| DEFAULT_BODY.to_string()),
        icon: NOTIFICATION_ICON.to_string(),
        badge: NOTIFICATION_ICON.to_string(),
        tag: NOTIFICATION_TAG.to_string(),
        require_interaction: false,
        actions: vec![
            NotificationAction {
                action: "open".to_string(),
                title: "Open".to_string(),
                icon: NOTIFICATION_ICON.to_string(),
            },
            NotificationAction {
                action: "close".to_string(),
                title: "Close".to_string(),
                icon: NOTIFICATION_ICON.to_string(),
            },
        ],
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// An open application window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: u64,
    pub url: String,
}

/// The windows a notification click can reach
pub trait Clients {
    fn windows(&self) -> Vec<WindowClient>;
    fn focus(&self, id: u64) -> Result<(), PushError>;
    fn open_window(&self, url: &Url) -> Result<(), PushError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Dismissed,
    Focused(u64),
    Opened,
}

/// `close` dismisses; anything else focuses the app at `target` or opens it
pub fn handle_notification_click(
    action: Option<&str>,
    target: &Url,
    clients: &impl Clients,
) -> Result<ClickOutcome, PushError> {
    if action == Some("close") {
        debug!("notification dismissed");
        return Ok(ClickOutcome::Dismissed);
    }

    let existing = clients
        .windows()
        .into_iter()
        .find(|window| same_page(&window.url, target));

    match existing {
        Some(window) => {
            clients.focus(window.id)?;
            Ok(ClickOutcome::Focused(window.id))
        }
        None => {
            clients.open_window(target)?;
            Ok(ClickOutcome::Opened)
        }
    }
}

/// Ignores the fragment, which only carries the in-app route
fn same_page(url: &str, target: &Url) -> bool {
    Url::parse(url).is_ok_and(|mut url| {
        url.set_fragment(None);
        let mut target = target.clone();
        target.set_fragment(None);
        url == target
    })
}

/// Desktop browser via the system opener. It cannot see existing windows,
/// so clicks always open a new one.
pub struct BrowserClients;

impl Clients for BrowserClients {
    fn windows(&self) -> Vec<WindowClient> {
        Vec::new()
    }

    fn focus(&self, id: u64) -> Result<(), PushError> {
        Err(PushError::Window(format!("cannot focus window {id}")))
    }

    fn open_window(&self, url: &Url) -> Result<(), PushError> {
        open::that(url.as_str()).map_err(|e| PushError::Window(e.to_string()))
    }
}
