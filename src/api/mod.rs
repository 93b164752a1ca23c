//! API layer - HTTP endpoints and middleware

pub mod health;
pub mod invoices;
pub mod middleware;
pub mod query;
pub mod router;
pub mod state;
pub mod types;

pub use router::{create_router, create_router_with_metrics};
pub use state::AppState;
