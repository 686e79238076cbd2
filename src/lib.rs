//! Session and access-token lifecycle management for Helmdesk clients.
//!
//! The [`SessionController`] is the single owner of session state: it runs
//! login, logout, and startup recovery, keeps the bearer token fresh on a
//! timer, and wipes the [`DataCache`] whenever the signed-in identity
//! changes. Request code reads the current token through a [`TokenReader`]
//! and never mutates session state directly.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;

pub use api::{ApiError, AuthClient};
pub use auth::{
    AuthGateway, Credential, Credentials, RefreshScheduler, SessionController, SessionError,
    SessionState, TokenHolder, TokenReader, DEFAULT_REFRESH_INTERVAL,
};
pub use cache::{CacheInvalidator, CachedData, DataCache};
pub use config::Config;
