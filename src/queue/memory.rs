//! In-process queue transport.
//!
//! Holds dispatches in a FIFO for a worker loop in the same process to
//! drain. Used by single-process servers and throughout the crate's tests;
//! nothing survives a restart.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::queue::transport::{QueueTransport, TransportError};
use crate::types::dispatch::TaskDispatch;

/// FIFO transport delivering dispatches inside the current process.
#[derive(Default)]
pub struct InProcessTransport {
    queue: Mutex<VecDeque<TaskDispatch>>,
    notify: Notify,
}

impl InProcessTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued dispatches.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Removes and returns the oldest dispatch, if any.
    pub fn try_pop(&self) -> Option<TaskDispatch> {
        self.queue.lock().pop_front()
    }

    /// Waits for a dispatch and removes it.
    pub async fn pop(&self) -> TaskDispatch {
        loop {
            if let Some(dispatch) = self.try_pop() {
                return dispatch;
            }
            self.notify.notified().await;
        }
    }
}

#[async_trait]
impl QueueTransport for InProcessTransport {
    async fn enqueue(&self, dispatch: TaskDispatch) -> Result<(), TransportError> {
        tracing::debug!(
            name = %dispatch.name,
            queue = %dispatch.queue,
            "queued in-process dispatch"
        );
        self.queue.lock().push_back(dispatch);
        self.notify.notify_one();
        Ok(())
    }
}

impl std::fmt::Debug for InProcessTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessTransport")
            .field("queued", &self.len())
            .finish()
    }
}
