//! GitHub webhook receiver for the Zeus CI pipeline engine.
//!
//! Verifies the `X-Hub-Signature-256` HMAC, turns `push` events into queued
//! [`zeusci_core::Build`] rows, and leaves everything else to the build
//! coordinator's poll loop.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
