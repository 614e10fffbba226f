// SPDX-License-Identifier: MPL-2.0

use crate::config::DEFAULT_PAGE_SIZE;
use crate::photo::PhotoFile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Both halves or nothing
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) => Some(Self { lat, lon }),
            _ => None,
        }
    }
}

/// A story as the server describes it.
///
/// The wire format carries `lat`/`lon` as independent nullable fields; we
/// only keep a location when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoryWire", into = "StoryWire")]
pub struct Story {
    pub id: String,
    /// Author name
    pub name: String,
    pub description: String,
    pub photo_url: String,
    pub created_at: String,
    pub location: Option<Coordinates>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoryWire {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    photo_url: String,
    #[serde(default)]
    created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lon: Option<f64>,
}

impl From<StoryWire> for Story {
    fn from(wire: StoryWire) -> Self {
        Self {
            location: Coordinates::from_parts(wire.lat, wire.lon),
            id: wire.id,
            name: wire.name,
            description: wire.description,
            photo_url: wire.photo_url,
            created_at: wire.created_at,
        }
    }
}

impl From<Story> for StoryWire {
    fn from(story: Story) -> Self {
        Self {
            id: story.id,
            name: story.name,
            description: story.description,
            photo_url: story.photo_url,
            created_at: story.created_at,
            lat: story.location.map(|c| c.lat),
            lon: story.location.map(|c| c.lon),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user_id: String,
    pub name: String,
    pub token: String,
}

/// A story about to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewStory {
    pub description: String,
    pub photo: PhotoFile,
    pub location: Option<Coordinates>,
}

/// Story list parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub size: u32,
    /// Only stories that carry coordinates
    pub with_location: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
            with_location: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Body of the push registration call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushSubscriptionPayload {
    pub endpoint: String,
    pub keys: PushKeys,
}

/// `{ error, message, ...data }`
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Ack {}

#[derive(Debug, Deserialize)]
pub(crate) struct StoryListData {
    #[serde(rename = "listStory", default)]
    pub list_story: Vec<Story>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StoryData {
    pub story: Story,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    #[serde(rename = "loginResult")]
    pub login_result: LoginResult,
}
