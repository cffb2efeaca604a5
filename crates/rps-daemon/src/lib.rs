//! rps-daemon library target.
//!
//! Exposes the controller, work queue, router and state for integration
//! tests. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod controller;
pub mod events;
pub mod queue;
pub mod routes;
pub mod state;
