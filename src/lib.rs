//! Flow-controlled read streams over MongoDB cursors
//!
//! A [`ReadStream`] wraps a query cursor and delivers documents one at a time
//! to a handler, honouring pause, resume and bounded `fetch(n)` demand. The
//! [`MongoClient`] façade opens those streams and covers the handful of
//! collection and document operations needed around them.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `client`: Client façade over the driver
//! - `config`: Configuration management
//! - `connection`: MongoDB connection management
//! - `error`: Error types and handling
//! - `stream`: The read stream and its cursor adapter
//!
//! # Example
//!
//! ```no_run
//! use bson::doc;
//! use mongo_readstream::{Config, MongoClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MongoClient::connect(Config::default()).await?;
//!
//!     let stream = client.find_batch("orders", doc! {}).await?;
//!     stream.handler(|order| println!("{order}"));
//!     stream.finished().await;
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod stream;

// Re-export commonly used types
pub use client::{AggregateOptions, FindOptions, MongoClient, UpdateOptions, UpdateResult};
pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{ClientError, Result, StreamError};
pub use stream::{ReadStream, StreamControl, StreamState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
