//! Transport boundary for handing dispatches to a real queue service.

use async_trait::async_trait;

use crate::types::dispatch::TaskDispatch;

/// Error raised by a queue transport.
///
/// Carries a transport-specific message plus the underlying cause when one
/// exists (HTTP error, connection reset, serialization failure inside the
/// transport).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Creates a transport error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Hands a [`TaskDispatch`] to a queue service for later delivery.
///
/// Implementations cover whatever queue the deployment runs: an HTTP push
/// queue, a message broker, or the bundled
/// [`InProcessTransport`](crate::queue::InProcessTransport) for tests and
/// single-process servers. Enqueue is fire-and-forget from the caller's
/// point of view; delivery, retry and backoff are the queue's concern,
/// driven by the dispatch's [`RetryOptions`](crate::types::RetryOptions).
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Accepts a dispatch for later delivery.
    async fn enqueue(&self, dispatch: TaskDispatch) -> Result<(), TransportError>;
}
