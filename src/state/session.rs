// SPDX-License-Identifier: MPL-2.0

use crate::api::LoginResult;
use crate::router::Route;
use crate::state::storage::{LocalStorage, SessionStorage, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const TOKEN_KEY: &str = "story_app_token";
pub const USER_KEY: &str = "story_app_user";
/// Lives in session storage only
pub const SUBSCRIPTION_KEY: &str = "subscription_notification";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("login response carried no token")]
    MissingToken,
    #[error("invalid session data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub profile: UserProfile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(Session),
}

/// Whether push delivery is active for this process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionMarker {
    pub endpoint: String,
    pub is_active: bool,
}

/// Holds the bearer credential and decides which routes are reachable.
///
/// A non-empty stored token is the whole definition of "authenticated"; the
/// gate never asks the server.
pub struct SessionGate {
    local: LocalStorage,
    session: SessionStorage,
}

impl SessionGate {
    pub fn new(local: LocalStorage, session: SessionStorage) -> Self {
        Self { local, session }
    }

    pub fn state(&self) -> AuthState {
        let Some(token) = self.token() else {
            return AuthState::Unauthenticated;
        };

        let profile = match self.local.get(USER_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("stored profile unreadable: {}", e);
                UserProfile::default()
            }),
            None => UserProfile::default(),
        };

        AuthState::Authenticated(Session { token, profile })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.local.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Unauthenticated -> Authenticated
    pub fn sign_in(&self, login: &LoginResult, email: &str) -> Result<Session, SessionError> {
        if login.token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        let profile = UserProfile {
            user_id: login.user_id.clone(),
            name: login.name.clone(),
            email: email.to_string(),
        };
        let profile_json =
            serde_json::to_string(&profile).map_err(|e| SessionError::InvalidData(e.to_string()))?;

        self.local.set(TOKEN_KEY, &login.token)?;
        self.local.set(USER_KEY, &profile_json)?;

        info!(user = %profile.user_id, "signed in");

        Ok(Session {
            token: login.token.clone(),
            profile,
        })
    }

    /// Authenticated -> Unauthenticated. Purges the subscription marker too.
    ///
    /// Token and profile go in one write. If that write fails the session
    /// stays exactly as it was, in memory and on disk.
    pub fn sign_out(&self) -> Result<(), SessionError> {
        self.local.remove_all(&[TOKEN_KEY, USER_KEY])?;
        self.session.remove(SUBSCRIPTION_KEY);
        info!("signed out");
        Ok(())
    }

    /// The route that will actually be shown for `route`
    pub fn authorize(&self, route: &Route) -> Route {
        let authenticated = self.is_authenticated();
        if route.is_protected() && !authenticated {
            Route::Login
        } else if route.is_guest_only() && authenticated {
            Route::Home
        } else {
            route.clone()
        }
    }

    pub fn subscription(&self) -> Option<SubscriptionMarker> {
        let raw = self.session.get(SUBSCRIPTION_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn set_subscription(&self, marker: &SubscriptionMarker) -> Result<(), SessionError> {
        let raw =
            serde_json::to_string(marker).map_err(|e| SessionError::InvalidData(e.to_string()))?;
        self.session.set(SUBSCRIPTION_KEY, &raw);
        Ok(())
    }

    pub fn clear_subscription(&self) {
        self.session.remove(SUBSCRIPTION_KEY);
    }
}
