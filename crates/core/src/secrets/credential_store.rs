//! Access token persistence with absolute expiry.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::Result;
use crate::storage::{get_json, set_json, KeyValueStore, ACCESS_TOKEN_KEY};

/// Seconds before expiry at which a token is proactively refreshed.
pub const TOKEN_REFRESH_WINDOW_SECS: i64 = 5 * 60;

/// OAuth access token plus the absolute instant it stops being usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn issued_at(
        access_token: impl Into<String>,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in,
            expires_at: issued_at + Duration::seconds(expires_in.max(0)),
        }
    }

    pub fn issued_now(access_token: impl Into<String>, expires_in: i64) -> Self {
        Self::issued_at(access_token, expires_in, Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Persists the current access token. Expired tokens are treated as absent.
pub trait CredentialStore: Send + Sync {
    fn get_saved_token(&self) -> Option<AccessToken>;
    fn save_token(&self, token: &AccessToken) -> Result<()>;
    fn clear_token(&self) -> Result<()>;
    fn time_remaining(&self) -> Option<Duration>;

    /// True when there is no usable token, or it expires within the refresh window.
    fn is_within_refresh_window(&self) -> bool;
}

/// [`CredentialStore`] backed by the local key-value store.
pub struct PersistentCredentialStore {
    store: Arc<dyn KeyValueStore>,
    refresh_window: Duration,
}

impl PersistentCredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            refresh_window: Duration::seconds(TOKEN_REFRESH_WINDOW_SECS),
        }
    }

    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// Read the token as of `now`, purging it from the store once expired.
    pub fn get_saved_token_at(&self, now: DateTime<Utc>) -> Option<AccessToken> {
        let token = match get_json::<AccessToken>(self.store.as_ref(), ACCESS_TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(err) => {
                warn!("[Credentials] Stored access token is unreadable: {}", err);
                let _ = self.store.delete(ACCESS_TOKEN_KEY);
                return None;
            }
        };
        if token.is_valid_at(now) {
            return Some(token);
        }
        debug!("[Credentials] Access token expired at {}, purging", token.expires_at);
        if let Err(err) = self.store.delete(ACCESS_TOKEN_KEY) {
            warn!("[Credentials] Failed to purge expired token: {}", err);
        }
        None
    }

    pub fn is_within_refresh_window_at(&self, now: DateTime<Utc>) -> bool {
        match self.get_saved_token_at(now) {
            Some(token) => token.remaining_at(now) <= self.refresh_window,
            None => true,
        }
    }
}

impl CredentialStore for PersistentCredentialStore {
    fn get_saved_token(&self) -> Option<AccessToken> {
        self.get_saved_token_at(Utc::now())
    }

    fn save_token(&self, token: &AccessToken) -> Result<()> {
        set_json(self.store.as_ref(), ACCESS_TOKEN_KEY, token)
    }

    fn clear_token(&self) -> Result<()> {
        self.store.delete(ACCESS_TOKEN_KEY)
    }

    fn time_remaining(&self) -> Option<Duration> {
        let now = Utc::now();
        self.get_saved_token_at(now).map(|token| token.remaining_at(now))
    }

    fn is_within_refresh_window(&self) -> bool {
        self.is_within_refresh_window_at(Utc::now())
    }
}
