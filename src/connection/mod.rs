//! Connection management for MongoDB
//!
//! This module provides:
//! - Connection establishment with retry and termination
//! - Connection pool settings derived from configuration
//! - Health checks via `ping` / `buildInfo`

use bson::doc;
use mongodb::{Client, Database, options::ClientOptions};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};

/// MongoDB connection manager
///
/// Owns the driver client and tracks the connection state.
pub struct ConnectionManager {
    /// MongoDB client instance
    client: Option<Client>,

    /// Connection configuration
    config: ConnectionConfig,

    /// Current connection state
    state: Arc<RwLock<ConnectionState>>,
}

/// Connection state information
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,

    /// Currently connecting
    Connecting,

    /// Connected and ready
    Connected,

    /// Connection failed
    Failed(String),
}

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,

    /// Minimum number of idle connections
    pub min_idle: u32,

    /// Connection timeout duration
    pub connection_timeout: Duration,

    /// Idle connection timeout duration
    pub idle_timeout: Duration,
}

/// Health check result
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the connection is healthy
    pub is_healthy: bool,

    /// Response time in milliseconds
    pub response_time_ms: u64,

    /// Server version
    pub server_version: Option<String>,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            client: None,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    /// Establish connection to MongoDB
    ///
    /// The URI is parsed, pool settings applied and the server pinged;
    /// failures are retried `retry_attempts` times with a linear backoff.
    pub async fn connect(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Connecting).await;

        let options = match Self::parse_uri(&self.config.connection_string).await {
            Ok(options) => self.configure_pool(options),
            Err(e) => {
                self.set_state(ConnectionState::Failed(e.to_string())).await;
                return Err(e);
            }
        };

        match self.connect_with_retry(options).await {
            Ok(client) => {
                self.client = Some(client);
                self.set_state(ConnectionState::Connected).await;
                info!("Connected to MongoDB");
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Failed(e.to_string())).await;
                Err(e)
            }
        }
    }

    /// Disconnect from MongoDB
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            info!("Disconnected from MongoDB");
        }
        self.set_state(ConnectionState::Disconnected).await;
        Ok(())
    }

    /// Ping the server and report round-trip time and version
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let client = self.get_client()?;
        let started = Instant::now();

        if let Err(e) = Self::ping(client).await {
            warn!("Health check failed: {}", e);
            return Ok(HealthStatus {
                is_healthy: false,
                response_time_ms: started.elapsed().as_millis() as u64,
                server_version: None,
            });
        }

        let response_time_ms = started.elapsed().as_millis() as u64;
        let server_version = self.get_server_version(client).await.ok();

        Ok(HealthStatus {
            is_healthy: true,
            response_time_ms,
            server_version,
        })
    }

    /// Get a database handle
    pub fn get_database(&self, name: &str) -> Result<Database> {
        Ok(self.get_client()?.database(name))
    }

    /// Get the MongoDB client
    pub fn get_client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ConnectionError::NotConnected.into())
    }

    /// Query the server version through `buildInfo`
    pub async fn get_server_version(&self, client: &Client) -> Result<String> {
        let info = client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await?;

        info.get_str("version")
            .map(str::to_string)
            .map_err(|e| ConnectionError::CommandFailed(e.to_string()).into())
    }

    /// Get current connection state
    pub async fn get_state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// Check if currently connected
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.read().await, ConnectionState::Connected)
    }

    /// Parse connection URI and create client options
    async fn parse_uri(uri: &str) -> Result<ClientOptions> {
        ClientOptions::parse(uri)
            .await
            .map_err(|e| ConnectionError::InvalidUri(format!("{uri}: {e}")).into())
    }

    /// Configure client options with pool settings
    fn configure_pool(&self, mut options: ClientOptions) -> ClientOptions {
        let pool = PoolConfig::from(&self.config);

        options.max_pool_size = Some(pool.max_size);
        options.min_pool_size = Some(pool.min_idle);
        options.connect_timeout = Some(pool.connection_timeout);
        options.server_selection_timeout = Some(pool.connection_timeout);
        options.max_idle_time = Some(pool.idle_timeout);
        if options.app_name.is_none() {
            options.app_name = self.config.app_name.clone();
        }
        options
    }

    /// Update connection state
    async fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().await = new_state;
    }

    /// Attempt connection with retries
    async fn connect_with_retry(&self, options: ClientOptions) -> Result<Client> {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!("Connecting to MongoDB (attempt {}/{})", attempt, attempts);

            let client = Client::with_options(options.clone())?;
            match Self::ping(&client).await {
                Ok(()) => return Ok(client),
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                    }
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no connection attempt made".to_string());
        Err(ConnectionError::ConnectionFailed(message).into())
    }

    /// Verify connection is alive by sending a ping
    async fn ping(client: &Client) -> Result<()> {
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| ConnectionError::PingFailed(e.to_string()).into())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: 0,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&ConnectionConfig> for PoolConfig {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            max_size: config.max_pool_size,
            min_idle: config.min_pool_size,
            connection_timeout: Duration::from_secs(config.timeout),
            idle_timeout: Duration::from_secs(config.idle_timeout),
        }
    }
}
