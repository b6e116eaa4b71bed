//! Wayfarer API crate: the axum HTTP surface over the travel agent and the
//! booking form.

pub mod client_ip;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
