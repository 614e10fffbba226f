// SPDX-License-Identifier: MPL-2.0

//! Offline-first core of a geotagged story client.
//!
//! A local mirror of server data, a caching layer in front of the network, a
//! queue of uploads made while offline and the reconciler that replays them,
//! a session gate, and push subscription management.

pub mod api;
pub mod app;
pub mod cache;
pub mod compose;
pub mod config;
pub mod net;
pub mod photo;
pub mod push;
pub mod router;
pub mod runtime;
pub mod state;
pub mod store;
pub mod sync;
pub mod validate;

#[cfg(test)]
mod testing;

pub use app::{AppError, StoryApp, SubmitOutcome};
