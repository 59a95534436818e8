//! Relay loop: the single consumer of the push queue.
//!
//! One request is in flight at a time. Every dequeued request yields exactly one
//! [`DeliveryOutcome`]; the callback (when requested) runs after the outcome is settled,
//! on every path including a panic inside the pipeline.

use crate::relay::callback::CallbackReporter;
use crate::relay::delivery::{deliver, MessageSender};
use crate::relay::message::build_message;
use crate::relay::payload::{DeliveryOutcome, PushRequest};
use crate::relay::queue::QueueConsumer;
use crate::relay::{Lifecycle, RelayError};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;

pub struct RelayLoop {
    queue: QueueConsumer,
    sender: Arc<dyn MessageSender>,
    destinations: Arc<[String]>,
    reporter: CallbackReporter,
    lifecycle: watch::Receiver<Lifecycle>,
}

impl RelayLoop {
    pub fn new(
        queue: QueueConsumer,
        sender: Arc<dyn MessageSender>,
        destinations: Arc<[String]>,
        reporter: CallbackReporter,
        lifecycle: watch::Receiver<Lifecycle>,
    ) -> Self {
        Self {
            queue,
            sender,
            destinations,
            reporter,
            lifecycle,
        }
    }

    /// Consume requests while the lifecycle is `Running`. Returns the queue so the owner can drain it.
    pub async fn run(mut self) -> QueueConsumer {
        log::info!(
            "relay loop started ({} destination(s))",
            self.destinations.len()
        );
        loop {
            if *self.lifecycle.borrow() != Lifecycle::Running {
                break;
            }
            let next = tokio::select! {
                biased;
                changed = self.lifecycle.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.queue.recv() => next,
            };
            let Some(request) = next else {
                log::info!("relay loop: all producers gone");
                break;
            };
            self.process(request).await;
        }
        log::info!("relay loop stopped");
        self.queue
    }

    /// Build, deliver and report one request.
    pub async fn process(&self, request: PushRequest) -> DeliveryOutcome {
        let id = request.message_id.as_str();
        log::info!("processing message {}", id);

        let pipeline = AssertUnwindSafe(self.build_and_deliver(&request)).catch_unwind();
        let outcome = match pipeline.await {
            Ok(Ok(())) => {
                log::info!("message {} processed", id);
                DeliveryOutcome::delivered(id)
            }
            Ok(Err(e)) => {
                if let RelayError::UnsupportedImageFormat(reason) = &e {
                    log::debug!("message {}: image rejected: {}", id, reason);
                }
                log::error!("message {} failed: {}", id, e);
                DeliveryOutcome::failed(id, e.to_string())
            }
            Err(panic) => {
                let e = RelayError::Internal(panic_message(panic.as_ref()));
                log::error!("message {} failed: {}", id, e);
                DeliveryOutcome::failed(id, e.to_string())
            }
        };

        if let Some(url) = request.callback() {
            self.reporter.report(url, &outcome).await;
        }
        outcome
    }

    async fn build_and_deliver(&self, request: &PushRequest) -> Result<(), RelayError> {
        let message = build_message(request)?;
        deliver(
            self.sender.as_ref(),
            &self.destinations,
            &message,
            &request.message_id,
        )
        .await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during processing".to_string()
    }
}
