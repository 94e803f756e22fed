//! Endpoint configuration, overridable from the environment.

use std::time::Duration;

pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_OAUTH_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn env_url(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SheetsClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SHEETS_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SheetsClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Reads `HOMELEDGER_SHEETS_API_URL`.
    pub fn from_env() -> Self {
        match env_url("HOMELEDGER_SHEETS_API_URL") {
            Some(url) => Self::new(&url),
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub token_url: String,
    pub authorize_url: String,
    pub redirect_uri: String,
    pub client_secret: Option<String>,
    pub scope: String,
    pub timeout: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_OAUTH_TOKEN_URL.to_string(),
            authorize_url: DEFAULT_OAUTH_AUTHORIZE_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            client_secret: None,
            scope: SHEETS_SCOPE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl OAuthConfig {
    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.trim().trim_end_matches('/').to_string();
        self
    }

    /// Reads `HOMELEDGER_OAUTH_TOKEN_URL`, `HOMELEDGER_OAUTH_AUTHORIZE_URL`,
    /// `HOMELEDGER_OAUTH_REDIRECT_URI` and `HOMELEDGER_OAUTH_CLIENT_SECRET`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_url: env_url("HOMELEDGER_OAUTH_TOKEN_URL").unwrap_or(defaults.token_url),
            authorize_url: env_url("HOMELEDGER_OAUTH_AUTHORIZE_URL")
                .unwrap_or(defaults.authorize_url),
            redirect_uri: env_url("HOMELEDGER_OAUTH_REDIRECT_URI")
                .unwrap_or(defaults.redirect_uri),
            client_secret: std::env::var("HOMELEDGER_OAUTH_CLIENT_SECRET")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let config = SheetsClientConfig::new(" http://127.0.0.1:9000/v4/ ");
        assert_eq!(config.base_url, "http://127.0.0.1:9000/v4");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
