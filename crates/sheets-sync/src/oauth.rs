//! Google OAuth credential provider.
//!
//! Interactive acquisition exchanges an authorization code for an access and refresh token.
//! Silent acquisition uses the stored refresh token. Both persist the access token through the
//! [`CredentialStore`] so every caller sees the same expiry.

use std::sync::Arc;

use async_trait::async_trait;
use homeledger_core::secrets::{AccessToken, CredentialStore, SecretStore, OAUTH_REFRESH_TOKEN_KEY};
use homeledger_core::sync::{CredentialProvider, RemoteCallError, RemoteLinkConfig};
use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use crate::config::OAuthConfig;
use crate::error::{Result, SheetsSyncError};
use crate::types::{TokenErrorResponse, TokenResponse};

/// Assumed lifetime when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Obtains an authorization code from the user for a consent URL.
#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    async fn request_authorization_code(&self, authorization_url: &str) -> Result<String>;
}

pub struct GoogleOAuthProvider {
    http: reqwest::Client,
    config: OAuthConfig,
    secrets: Arc<dyn SecretStore>,
    credentials: Arc<dyn CredentialStore>,
    prompt: Arc<dyn AuthorizationPrompt>,
    refresh_lock: Mutex<()>,
}

impl GoogleOAuthProvider {
    pub fn new(
        config: OAuthConfig,
        secrets: Arc<dyn SecretStore>,
        credentials: Arc<dyn CredentialStore>,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            secrets,
            credentials,
            prompt,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Consent URL for `client_id`, requesting offline access so a refresh token is issued.
    pub fn authorization_url(&self, client_id: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.config.authorize_url,
            urlencoding::encode(client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scope),
        )
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
                let message = match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                };
                error!("[OAuth] Token request failed ({}): {}", status, message);
                return Err(SheetsSyncError::api(status.as_u16(), message));
            }
            error!("[OAuth] Token request failed with status {}", status);
            return Err(SheetsSyncError::api(
                status.as_u16(),
                format!("Token request failed: {}", body),
            ));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Persist the refresh token (when rotated or newly issued) and the access token.
    fn store_tokens(&self, response: TokenResponse) -> Result<AccessToken> {
        if let Some(refresh_token) = response.refresh_token.as_deref() {
            self.secrets
                .set_secret(OAUTH_REFRESH_TOKEN_KEY, refresh_token)
                .map_err(|e| SheetsSyncError::auth(format!("Failed to store refresh token: {}", e)))?;
        }

        let token = AccessToken::issued_now(
            response.access_token,
            response.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
        );
        if let Err(err) = self.credentials.save_token(&token) {
            warn!("[OAuth] Failed to persist access token: {}", err);
        }
        Ok(token)
    }

    fn client_form<'a>(&'a self, config: &'a RemoteLinkConfig) -> Vec<(&'a str, &'a str)> {
        let mut form = vec![("client_id", config.client_id.as_str())];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        form
    }

    pub async fn exchange_code(&self, config: &RemoteLinkConfig, code: &str) -> Result<AccessToken> {
        let code = code.trim();
        if code.is_empty() {
            return Err(SheetsSyncError::invalid_request("Authorization code is empty"));
        }
        let mut form = self.client_form(config);
        form.extend([
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ]);

        let response = self.request_token(&form).await?;
        if response.refresh_token.is_none() {
            warn!("[OAuth] Authorization response carried no refresh token");
        }
        let token = self.store_tokens(response)?;
        info!("[OAuth] Authorization completed");
        Ok(token)
    }

    pub async fn refresh(&self, config: &RemoteLinkConfig) -> Result<AccessToken> {
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = self.credentials.get_saved_token() {
            if !self.credentials.is_within_refresh_window() {
                return Ok(token);
            }
        }

        let refresh_token = self
            .secrets
            .get_secret(OAUTH_REFRESH_TOKEN_KEY)
            .map_err(|e| SheetsSyncError::auth(format!("Failed to read refresh token: {}", e)))?
            .ok_or_else(|| {
                SheetsSyncError::auth("No refresh token stored. Please reconnect.")
            })?;

        debug!("[OAuth] Refreshing access token");
        let mut form = self.client_form(config);
        form.extend([
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ]);

        match self.request_token(&form).await {
            Ok(response) => {
                let token = self.store_tokens(response)?;
                debug!("[OAuth] Access token refreshed (expires {})", token.expires_at);
                Ok(token)
            }
            Err(err) => {
                if matches!(&err, SheetsSyncError::Api { message, .. } if message.starts_with("invalid_grant"))
                {
                    if let Err(e) = self.secrets.delete_secret(OAUTH_REFRESH_TOKEN_KEY) {
                        warn!("[OAuth] Failed to delete revoked refresh token: {}", e);
                    }
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for GoogleOAuthProvider {
    async fn acquire_interactive(
        &self,
        config: &RemoteLinkConfig,
    ) -> std::result::Result<AccessToken, RemoteCallError> {
        if !config.is_complete() {
            return Err(SheetsSyncError::invalid_request("Remote link configuration is incomplete").into());
        }
        let url = self.authorization_url(&config.client_id);
        let code = self.prompt.request_authorization_code(&url).await?;
        Ok(self.exchange_code(config, &code).await?)
    }

    async fn acquire_silent(
        &self,
        config: &RemoteLinkConfig,
    ) -> std::result::Result<AccessToken, RemoteCallError> {
        Ok(self.refresh(config).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockOutcome, MockServer};
    use homeledger_core::secrets::PersistentCredentialStore;
    use homeledger_core::storage::MemoryKeyValueStore;
    use homeledger_core::sync::SyncErrorKind;

    struct FixedCode(&'static str);

    #[async_trait]
    impl AuthorizationPrompt for FixedCode {
        async fn request_authorization_code(&self, authorization_url: &str) -> Result<String> {
            assert!(authorization_url.contains("access_type=offline"));
            Ok(self.0.to_string())
        }
    }

    struct Fixture {
        server: MockServer,
        kv: Arc<MemoryKeyValueStore>,
        credentials: Arc<PersistentCredentialStore>,
        provider: GoogleOAuthProvider,
    }

    async fn fixture(outcomes: Vec<MockOutcome>) -> Fixture {
        let server = MockServer::start(outcomes).await;
        let kv = Arc::new(MemoryKeyValueStore::new());
        let credentials = Arc::new(PersistentCredentialStore::new(kv.clone()));
        let config = OAuthConfig::default().with_token_url(&format!("{}/token", server.base_url));
        let provider = GoogleOAuthProvider::new(
            config,
            kv.clone(),
            credentials.clone(),
            Arc::new(FixedCode("4/0Ab-code")),
        )
        .expect("provider");
        Fixture {
            server,
            kv,
            credentials,
            provider,
        }
    }

    fn link() -> RemoteLinkConfig {
        RemoteLinkConfig::new("client.apps.example", "AIza-test", "sheet-123")
    }

    #[tokio::test]
    async fn interactive_exchanges_code_and_stores_tokens() {
        let f = fixture(vec![MockOutcome::json(
            200,
            r#"{"access_token":"ya29.first","expires_in":3599,"refresh_token":"1//refresh","token_type":"Bearer"}"#,
        )])
        .await;

        let token = f.provider.acquire_interactive(&link()).await.expect("token");

        assert_eq!(token.access_token, "ya29.first");
        assert_eq!(f.credentials.get_saved_token(), Some(token));
        assert_eq!(
            f.kv.get_secret(OAUTH_REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("1//refresh")
        );
        let requests = f.server.requests().await;
        assert_eq!(requests[0].path, "/token");
        assert!(requests[0].body.contains("grant_type=authorization_code"));
        assert!(requests[0].body.contains("code=4%2F0Ab-code"));
    }

    #[tokio::test]
    async fn silent_refresh_uses_stored_refresh_token() {
        let f = fixture(vec![MockOutcome::json(
            200,
            r#"{"access_token":"ya29.refreshed","expires_in":3599}"#,
        )])
        .await;
        f.kv.set_secret(OAUTH_REFRESH_TOKEN_KEY, "1//refresh").unwrap();

        let token = f.provider.acquire_silent(&link()).await.expect("refreshed");

        assert_eq!(token.access_token, "ya29.refreshed");
        assert!(!f.credentials.is_within_refresh_window());
        let requests = f.server.requests().await;
        assert!(requests[0].body.contains("grant_type=refresh_token"));
        assert!(requests[0].body.contains("refresh_token=1%2F%2Frefresh"));
        // Refresh token kept when the response does not rotate it.
        assert_eq!(
            f.kv.get_secret(OAUTH_REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("1//refresh")
        );
    }

    #[tokio::test]
    async fn silent_refresh_skips_request_while_token_is_fresh() {
        let f = fixture(vec![]).await;
        f.credentials
            .save_token(&AccessToken::issued_now("ya29.fresh", 3600))
            .unwrap();

        let token = f.provider.acquire_silent(&link()).await.expect("cached");

        assert_eq!(token.access_token, "ya29.fresh");
        assert!(f.server.requests().await.is_empty());
    }

    #[tokio::test]
    async fn revoked_refresh_token_is_auth_failure() {
        let f = fixture(vec![MockOutcome::json(
            400,
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        )])
        .await;
        f.kv.set_secret(OAUTH_REFRESH_TOKEN_KEY, "1//revoked").unwrap();

        let err = f.provider.acquire_silent(&link()).await.expect_err("revoked");

        assert_eq!(err.classify(), SyncErrorKind::AuthExpired);
        assert!(f.kv.get_secret(OAUTH_REFRESH_TOKEN_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_request() {
        let f = fixture(vec![]).await;

        let err = f.provider.acquire_silent(&link()).await.expect_err("no refresh token");

        assert_eq!(err.classify(), SyncErrorKind::AuthExpired);
        assert!(f.server.requests().await.is_empty());
    }
}
