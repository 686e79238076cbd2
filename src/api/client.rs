//! HTTP client for the remote auth service.
//!
//! Implements the three session operations over JSON. Renewal and remote
//! logout ride the long-lived session cookie the service sets at login, so
//! the cookie store is enabled; the client itself never holds a refresh
//! secret.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{AuthGateway, Credential, Credentials};

use super::ApiError;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Auth service client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_token(response: reqwest::Response) -> Result<Credential, ApiError> {
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        if body.token.is_empty() {
            return Err(ApiError::InvalidResponse("empty token in response".to_string()));
        }
        Ok(Credential::new(body.token))
    }
}

#[async_trait]
impl AuthGateway for AuthClient {
    async fn login(&self, credentials: &Credentials) -> Result<Credential, ApiError> {
        let url = self.url("/auth/login");
        debug!(url = %url, "sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_token(response).await
    }

    async fn refresh(&self) -> Result<Credential, ApiError> {
        let url = self.url("/auth/refresh");
        debug!(url = %url, "sending refresh request");

        let response = self.client.post(&url).send().await?;
        let response = Self::check_response(response).await?;
        Self::parse_token(response).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let url = self.url("/auth/logout");
        debug!(url = %url, "sending logout request");

        let response = self.client.post(&url).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }
}
