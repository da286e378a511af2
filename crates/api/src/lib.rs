pub mod ad_handlers;
pub mod auth_handlers;
pub mod error;
pub mod middleware;
pub mod router;
pub mod session;
pub mod state;

pub use error::ApiError;
pub use router::router;
pub use state::AppState;
