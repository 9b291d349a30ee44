//! ORIGIN API - HTTP surface
//!
//! Routes, handlers, and the middleware stack binding the admission layers
//! in declared order: correlation → auth → scope → rate limit → IP → route.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorBody};
pub use metrics::Metrics;
pub use routes::create_router;
pub use state::AppState;
