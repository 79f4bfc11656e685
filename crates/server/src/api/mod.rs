pub mod handlers;
pub mod middleware;
pub mod remote;
pub mod routes;
pub mod sessions;
pub mod workflows;
pub mod ws;

pub use routes::create_router;
pub use ws::{ClientCommand, WsSink};
