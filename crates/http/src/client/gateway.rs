//! Authenticated request gateway
//!
//! Every API call goes through [`Gateway::call`]. It attaches the stored
//! access token, and when the server answers 401 it runs one refresh cycle and
//! sends the request a second time. A request is never sent more than
//! [`MAX_ATTEMPTS`] times.

use super::error::ClientError;
use super::request::ApiRequest;
use super::session::{CredentialPair, Session};
use crate::types::{RefreshRequest, TokenResponse};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Original attempt plus at most one retry
pub const MAX_ATTEMPTS: usize = 2;

/// Endpoint that exchanges a refresh token for a new pair
pub const REFRESH_PATH: &str = "/auth/refresh";

const USER_AGENT: &str = concat!("katara-client/", env!("CARGO_PKG_VERSION"));

/// Gateway to the backend API
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: Client,
    base_url: String,
    session: Session,
    /// Held for the duration of a refresh so concurrent 401s share one
    refresh_lock: Mutex<()>,
}

impl Gateway {
    /// Create a gateway with transport defaults
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the transport cannot be built.
    pub fn new(base_url: impl Into<String>, session: Session) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).session(session).build()
    }

    /// Create a new gateway builder
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Session the gateway reads credentials from
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Whether an access token is stored
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    /// Replace the stored credentials after a successful sign-in
    ///
    /// # Errors
    ///
    /// Returns an error if the pair is partial or cannot be stored.
    pub fn sign_in(&self, pair: CredentialPair) -> Result<(), ClientError> {
        self.inner.session.write(pair)?;
        info!("Signed in");
        Ok(())
    }

    /// Forget the stored credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be cleared.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.inner.session.clear()?;
        info!("Signed out");
        Ok(())
    }

    /// Perform one API call
    ///
    /// Transport failures are errors. Every HTTP status, including a 401
    /// that survived the refresh cycle, is returned as a response.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] on transport failure.
    pub async fn call(&self, request: &ApiRequest) -> Result<Response, ClientError> {
        let mut attempt = 1;
        loop {
            let sent_token = self.access_token_for(request);
            let response = request
                .build(&self.inner.client, &self.inner.base_url, sent_token.as_deref())?
                .send()
                .await?;
            let status = response.status();
            debug!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                attempt,
                "API call completed"
            );

            if status != StatusCode::UNAUTHORIZED || !request.auth || attempt >= MAX_ATTEMPTS {
                return Ok(response);
            }

            if !self.refresh_after(sent_token.as_deref()).await {
                return Ok(response);
            }

            attempt += 1;
        }
    }

    fn access_token_for(&self, request: &ApiRequest) -> Option<String> {
        if !request.auth {
            return None;
        }
        self.inner.session.read().map(|pair| pair.access_token)
    }

    /// Refresh unless another caller already replaced the rejected token
    async fn refresh_after(&self, rejected_token: Option<&str>) -> bool {
        let _guard = self.inner.refresh_lock.lock().await;

        if let Some(current) = self.inner.session.read()
            && Some(current.access_token.as_str()) != rejected_token
        {
            debug!("Access token changed while waiting, reusing it");
            return true;
        }

        self.refresh_locked().await
    }

    /// Exchange the stored refresh token for a new credential pair
    ///
    /// Returns false without contacting the server if no refresh token is
    /// stored. Any other failure clears the session.
    pub async fn refresh(&self) -> bool {
        let _guard = self.inner.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        let Some(pair) = self.inner.session.read() else {
            debug!("No refresh token stored, skipping refresh");
            return false;
        };

        let result = match self.request_new_pair(pair.refresh_token).await {
            Ok(new_pair) => self.inner.session.write(new_pair),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("Session refreshed");
                true
            }
            Err(e) => {
                warn!("Token refresh failed, clearing session: {e}");
                if let Err(e) = self.inner.session.clear() {
                    warn!("Failed to clear session: {e}");
                }
                false
            }
        }
    }

    async fn request_new_pair(&self, refresh_token: String) -> Result<CredentialPair, ClientError> {
        let request = ApiRequest::post(REFRESH_PATH)
            .public()
            .json(&RefreshRequest { refresh_token })?;
        let response = request
            .build(&self.inner.client, &self.inner.base_url, None)?
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ClientError::from_status(status, None));
        }

        let tokens: TokenResponse = serde_json::from_slice(&body)?;
        if !tokens.ok {
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                detail: tokens.detail,
            });
        }
        tokens.credential_pair().ok_or_else(|| ClientError::Rejected {
            status: status.as_u16(),
            detail: Some("refresh response is missing tokens".to_string()),
        })
    }
}

/// Builder for Gateway
#[derive(Default)]
pub struct GatewayBuilder {
    base_url: Option<String>,
    session: Option<Session>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl GatewayBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the credential session
    #[must_use]
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Set a transport timeout; none by default
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the gateway
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the base URL or session is
    /// missing, or the transport cannot be built.
    pub fn build(self) -> Result<Gateway, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let session = self
            .session
            .ok_or_else(|| ClientError::Configuration("session is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new()
            .user_agent(self.user_agent.unwrap_or_else(|| USER_AGENT.to_string()));
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        let client = client_builder.build()?;

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                client,
                base_url,
                session,
                refresh_lock: Mutex::new(()),
            }),
        })
    }
}
