mod client;
mod error;

pub use client::AuthClient;
pub use error::ApiError;
