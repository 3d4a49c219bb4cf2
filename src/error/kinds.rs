use std::{fmt, io};

use crate::error::mongo::{extract_error_info, format_mongodb_error};

/// Crate-wide `Result` type using [`ClientError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Top-level error type for client operations.
#[derive(Debug)]
pub enum ClientError {
    /// Connection-related errors.
    Connection(ConnectionError),

    /// Errors raised by a document stream or its control API.
    Stream(StreamError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// MongoDB driver errors.
    MongoDb(mongodb::error::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Invalid connection URI.
    InvalidUri(String),

    /// Not currently connected to MongoDB.
    NotConnected,

    /// Ping command failed.
    PingFailed(String),

    /// Command execution failed.
    CommandFailed(String),
}

/// Errors surfaced by a [`ReadStream`](crate::stream::ReadStream).
///
/// Data-flow errors (`Connection`, `QueryExecution`, `Decode`) reach the
/// consumer through the exception handler, at most once per stream.
/// `InvalidDemand` is returned synchronously from `fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The driver lost or could not reach the server.
    Connection(String),

    /// The server rejected or failed the query mid-stream.
    QueryExecution { code: Option<i32>, message: String },

    /// A returned document could not be decoded into the stream item type.
    Decode(String),

    /// `fetch` was called with a non-positive amount.
    InvalidDemand(u64),

    /// The cursor was already closed.
    Closed,
}

/// Discriminant of a [`StreamError`], handy for matching in handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamErrorKind {
    Connection,
    QueryExecution,
    Decode,
    InvalidDemand,
    Closed,
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

impl StreamError {
    /// Kind of this error.
    pub fn kind(&self) -> StreamErrorKind {
        match self {
            StreamError::Connection(_) => StreamErrorKind::Connection,
            StreamError::QueryExecution { .. } => StreamErrorKind::QueryExecution,
            StreamError::Decode(_) => StreamErrorKind::Decode,
            StreamError::InvalidDemand(_) => StreamErrorKind::InvalidDemand,
            StreamError::Closed => StreamErrorKind::Closed,
        }
    }

    /// Classify a driver error raised while iterating a cursor.
    pub fn from_driver(error: &mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        match error.kind.as_ref() {
            ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Authentication { .. } => StreamError::Connection(error.to_string()),
            ErrorKind::BsonDeserialization(e) => StreamError::Decode(e.to_string()),
            _ => {
                let info = extract_error_info(error);
                StreamError::QueryExecution {
                    code: info.code(),
                    message: info.message.unwrap_or_else(|| error.to_string()),
                }
            }
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Connection(e) => write!(f, "Connection error: {e}"),
            ClientError::Stream(e) => write!(f, "Stream error: {e}"),
            ClientError::Config(e) => write!(f, "Configuration error: {e}"),
            ClientError::Io(e) => write!(f, "I/O error: {e}"),
            ClientError::MongoDb(e) => format_mongodb_error(f, e),
            ClientError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::InvalidUri(uri) => write!(f, "Invalid connection URI: {uri}"),
            ConnectionError::NotConnected => write!(f, "Not connected to MongoDB"),
            ConnectionError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
            ConnectionError::CommandFailed(msg) => write!(f, "Command failed: {msg}"),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Connection(msg) => write!(f, "Connection lost: {msg}"),
            StreamError::QueryExecution {
                code: Some(code),
                message,
            } => write!(f, "Query failed ({code}): {message}"),
            StreamError::QueryExecution { code: None, message } => {
                write!(f, "Query failed: {message}")
            }
            StreamError::Decode(msg) => write!(f, "Failed to decode document: {msg}"),
            StreamError::InvalidDemand(n) => {
                write!(f, "Invalid demand {n}: fetch requires a positive amount")
            }
            StreamError::Closed => write!(f, "Cursor is closed"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ClientError {}
impl std::error::Error for ConnectionError {}
impl std::error::Error for StreamError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ClientError ========================= */

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        ClientError::Io(err)
    }
}

impl From<mongodb::error::Error> for ClientError {
    fn from(err: mongodb::error::Error) -> Self {
        ClientError::MongoDb(err)
    }
}

impl From<ConnectionError> for ClientError {
    fn from(err: ConnectionError) -> Self {
        ClientError::Connection(err)
    }
}

impl From<StreamError> for ClientError {
    fn from(err: StreamError) -> Self {
        ClientError::Stream(err)
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        ClientError::Config(err)
    }
}

impl From<String> for ClientError {
    fn from(msg: String) -> Self {
        ClientError::Generic(msg)
    }
}

impl From<&str> for ClientError {
    fn from(msg: &str) -> Self {
        ClientError::Generic(msg.to_owned())
    }
}
