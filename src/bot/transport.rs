//! Chat transport seam
//!
//! The lifecycle controller and the digest only talk to the chat through
//! [`ChatTransport`], so the Telegram client and the test doubles are
//! interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// User/chat identity that signals and stats are keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub i64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a message we sent (or received), used for later deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle(pub i64);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api rejected {method}: {description}")]
    Api { method: &'static str, description: String },
    #[error("malformed response from {0}")]
    Malformed(&'static str),
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, owner: OwnerId, text: &str) -> Result<MessageHandle, TransportError>;

    async fn send_photo(
        &self,
        owner: OwnerId,
        image: Vec<u8>,
        caption: &str,
    ) -> Result<MessageHandle, TransportError>;

    /// Callers must treat failure as non-fatal; the message may already be gone.
    async fn delete_message(&self, owner: OwnerId, message: MessageHandle) -> Result<(), TransportError>;
}
