//! Retro filter service client.
//!
//! Provides the HTTP API wrapper, the job lifecycle tracker (one polling
//! loop per submitted job), the service liveness monitor, and the event
//! types a rendering sink subscribes to.

pub mod api;
pub mod config;
pub mod events;
pub mod liveness;
pub mod poller;
mod registry;
pub mod service;
pub mod submit;
pub mod tracker;
