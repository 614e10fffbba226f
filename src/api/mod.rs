// SPDX-License-Identifier: MPL-2.0

mod client;
mod types;

pub use client::{ClientError, Fetched, StoryClient};
pub use types::{
    Coordinates, ListQuery, LoginResult, NewStory, PushKeys, PushSubscriptionPayload, Story,
};
