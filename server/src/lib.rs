//! ratediff Server
//!
//! JSON-over-HTTP front end for the rate resolver: the currency listing and
//! the two-date rate difference.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
