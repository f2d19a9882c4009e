pub mod connection;
pub mod error;
pub mod kv_store;

pub use connection::{Database, DatabaseConfig};
pub use error::{DatabaseError, Result};
pub use kv_store::SqliteStore;
