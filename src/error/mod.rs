//! Error handling for the client and its document streams.
//!
//! - [`ClientError`] is the crate-wide error returned by façade operations
//! - [`StreamError`] is the taxonomy delivered through a stream's exception handler
//! - [`mongo`] extracts structured details from driver errors
//!
//! # Example
//!
//! ```rust,no_run
//! use mongo_readstream::error::{StreamError, StreamErrorKind};
//!
//! fn on_error(err: StreamError) {
//!     if err.kind() == StreamErrorKind::Connection {
//!         eprintln!("lost the server: {err}");
//!     }
//! }
//! ```

pub mod kinds;
pub mod mongo;

pub use kinds::{
    ClientError, ConfigError, ConnectionError, Result, StreamError, StreamErrorKind,
};
pub use mongo::{ErrorInfo, extract_error_info};
