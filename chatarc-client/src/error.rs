//! Structured error types for the extraction client.
//!
//! The taxonomy mirrors how failures propagate: auth expiry and cancellation
//! abort the whole export, a retries-exhausted request aborts one
//! conversation, and single-asset failures never surface here at all (the
//! fetcher degrades them to reference-only assets).

use chatarc_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Credential supplier could not produce a fresh token.
    #[error("authentication expired and could not be refreshed")]
    AuthExpired,

    /// Retries exhausted on a request.
    #[error("request to {endpoint} failed after {attempts} attempt(s): {message}")]
    Network {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// Conversation extraction hit an unrecoverable request failure.
    #[error("extraction of conversation {conversation_id} failed: {source}")]
    Extraction {
        conversation_id: String,
        #[source]
        source: Box<ClientError>,
    },

    /// Response body could not be decoded.
    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Cancellation observed at a suspension point.
    #[error("operation cancelled")]
    Cancelled,

    /// Core-side failure (rendering, configuration).
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Create a network error after retries were exhausted
    pub fn network(endpoint: impl Into<String>, attempts: u32, message: impl Into<String>) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Create a decode error with context
    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    /// Wrap a per-conversation failure
    pub fn extraction(conversation_id: impl Into<String>, source: ClientError) -> Self {
        Self::Extraction {
            conversation_id: conversation_id.into(),
            source: Box::new(source),
        }
    }

    /// Fatal errors abort the whole export; everything else is recorded
    /// against the conversation being processed and the batch continues.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::AuthExpired | ClientError::Cancelled => true,
            ClientError::Extraction { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}
