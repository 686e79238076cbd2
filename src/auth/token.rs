//! In-memory storage for the current bearer credential.
//!
//! The holder is pure storage: one writer (the session controller), any
//! number of readers (request layer, UI). Readers get a `TokenReader`,
//! which has no mutation surface.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// An opaque bearer credential. Stored and forwarded on requests,
/// never parsed; expiry is tracked server-side. Never printable.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Cell holding the current credential or none.
///
/// Every `set` notifies subscribers exactly once, even when the new value
/// equals the old; subscribers must be idempotent.
#[derive(Debug, Clone)]
pub struct TokenHolder {
    tx: Arc<watch::Sender<Option<Credential>>>,
}

impl TokenHolder {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Current credential, if any.
    pub fn get(&self) -> Option<Credential> {
        self.tx.borrow().clone()
    }

    /// Replace the stored credential and notify subscribers.
    pub fn set(&self, credential: Option<Credential>) {
        self.tx.send_replace(credential);
    }

    /// Read-only view for consumers that attach the token to requests.
    pub fn reader(&self) -> TokenReader {
        TokenReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for TokenHolder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle onto the token cell.
#[derive(Debug, Clone)]
pub struct TokenReader {
    rx: watch::Receiver<Option<Credential>>,
}

impl TokenReader {
    /// Consulted per outgoing request.
    pub fn get(&self) -> Option<Credential> {
        self.rx.borrow().clone()
    }

    /// Wait for the next token change. Returns `false` once the holder
    /// has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
