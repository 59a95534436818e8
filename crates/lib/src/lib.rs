//! pushlite core library: push API, relay queue and loop, delivery channels, and config
//! used by the CLI.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod relay;
pub mod service;
