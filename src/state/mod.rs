// SPDX-License-Identifier: MPL-2.0

mod session;
pub mod settings;
mod storage;

pub use session::{
    AuthState, SUBSCRIPTION_KEY, Session, SessionError, SessionGate, SubscriptionMarker,
    TOKEN_KEY, USER_KEY, UserProfile,
};
pub use settings::AppSettings;
pub use storage::{LocalStorage, SessionStorage, StorageError};
