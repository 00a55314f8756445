//! HTTP server for Docket.
//!
//! Exposes named JSON collections over a small CRUD + search surface.
//! Mutations run to completion even if the client disconnects; searches are
//! abandoned as soon as the client goes away.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use handler::AppState;
pub use server::DocketServer;
