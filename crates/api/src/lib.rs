//! Admin area of the Martin Luther site: login with password and one-time
//! code, remembered devices, sliding server-side sessions.
//!
//! The library exposes the router and state so the binary and the
//! integration tests build exactly the same application.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::Config;
pub use state::AppState;
