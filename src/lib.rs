pub mod caption;
pub mod config;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod qa;
pub mod registry;
pub mod server;
pub mod session;
pub mod shell;

pub use error::{Error, Result};
