//! Push queue: FIFO channel from the API listener (producer) to the relay loop (consumer).
//!
//! Waiting for the next request is an async receive, so the relay task yields to the
//! runtime instead of parking a thread. The receiver sits behind an async mutex so a
//! [`QueueDrain`] can still empty the queue after the relay task has been aborted.

use crate::relay::payload::PushRequest;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<PushRequest>>>;

/// Create a connected producer/consumer pair.
pub fn channel() -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        QueueProducer { tx },
        QueueConsumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Returned when the consumer side is gone; carries the rejected request back.
#[derive(Debug, thiserror::Error)]
#[error("push queue closed")]
pub struct QueueClosed(pub PushRequest);

/// Producer handle; cheap to clone (one per listener worker).
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: mpsc::UnboundedSender<PushRequest>,
}

impl QueueProducer {
    pub fn push(&self, request: PushRequest) -> Result<(), QueueClosed> {
        self.tx.send(request).map_err(|e| QueueClosed(e.0))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single consumer handle, owned by the relay loop while it runs.
#[derive(Debug)]
pub struct QueueConsumer {
    rx: SharedReceiver,
}

impl QueueConsumer {
    /// Wait for the next request. `None` once every producer is dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<PushRequest> {
        self.rx.lock().await.recv().await
    }

    /// Number of requests currently waiting (0 while a receive is pending).
    pub fn len(&self) -> usize {
        self.rx.try_lock().map(|rx| rx.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle that can close and empty the queue independently of this consumer.
    pub fn drain_handle(&self) -> QueueDrain {
        QueueDrain {
            rx: self.rx.clone(),
        }
    }
}

/// Shutdown-side handle on the consumer end of the queue.
#[derive(Debug, Clone)]
pub struct QueueDrain {
    rx: SharedReceiver,
}

impl QueueDrain {
    /// Close the queue for producers and discard everything still waiting.
    /// Returns the discarded requests' ids in queue order. Waits for any pending
    /// receive in the relay loop to finish or be cancelled.
    pub async fn close_and_drain(&self) -> Vec<String> {
        let mut rx = self.rx.lock().await;
        rx.close();
        let mut discarded = Vec::new();
        while let Ok(req) = rx.try_recv() {
            discarded.push(req.message_id);
        }
        discarded
    }
}
