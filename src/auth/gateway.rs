//! Trait seam over the three remote auth operations.

use std::fmt;

use async_trait::async_trait;

use crate::api::ApiError;

use super::token::Credential;

/// Login form credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Remote auth service operations.
///
/// Implementations return tagged results and never let a transport fault
/// escape as a panic. `refresh` carries no explicit parameter: renewal rides
/// an ambient mechanism (a long-lived cookie), so the client never holds a
/// separate refresh secret.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<Credential, ApiError>;

    async fn refresh(&self) -> Result<Credential, ApiError>;

    /// Best-effort notification; callers decide what a failure means.
    async fn logout(&self) -> Result<(), ApiError>;
}
