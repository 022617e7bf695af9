//! Relay service library: configuration, HTTP surface, observability and the
//! debug ticker. `main.rs` wires these together with the hub and upstream link.
pub mod api;
pub mod app;
pub mod config;
pub mod observability;
pub mod ticker;
