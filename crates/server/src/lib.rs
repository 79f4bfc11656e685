//! HTTP and WebSocket surface for framefuse.
//!
//! The binary in `main.rs` wires the real tool runner and capabilities into
//! an [`AppState`]; tests build the same router around mocks.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
