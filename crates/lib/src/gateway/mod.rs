//! Push API: the HTTP front door that feeds the relay queue.
//!
//! `POST /send` takes `{content?, image?, callback_url?, message_id?}` with a bearer token,
//! validates the shape and enqueues a push request. `GET /` is a health check.

mod protocol;
mod server;

pub use protocol::{ApiError, SendAccepted, SendParams};
pub use server::{router, serve_api, ApiState};
