//! Command-line interface for mongo-readstream
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and CLI overrides
//! - Running `find` / `aggregate` as streams, in unbounded or paged mode

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bson::{Bson, Document};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use crate::client::{AggregateOptions, FindOptions, MongoClient};
use crate::config::Config;
use crate::error::{ClientError, ConfigError, Result, StreamError};
use crate::stream::{ReadStream, StreamState};

/// Extract database name from MongoDB connection URI
///
/// Format: mongodb://[username:password@]host[:port][/database][?options]
fn extract_database_from_uri(uri: &str) -> Option<String> {
    let after_scheme = uri.split("://").nth(1)?;
    let path_part = after_scheme.split('/').nth(1)?;
    let db_name = path_part.split('?').next().unwrap_or("");
    if db_name.is_empty() {
        None
    } else {
        Some(db_name.to_string())
    }
}

/// Hide credentials between `://` and `@`
fn sanitize_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(proto_end), Some(host_start)) if host_start > proto_end => {
            format!("{}***{}", &uri[..proto_end + 3], &uri[host_start..])
        }
        _ => uri.to_string(),
    }
}

/// Stream MongoDB query results with flow control
#[derive(Parser, Debug)]
#[command(
    name = "mongo-readstream",
    version,
    about = "Stream MongoDB query results with pause, resume and bounded fetch"
)]
pub struct CliArgs {
    /// MongoDB connection URI
    ///
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    #[arg(long, global = true, value_name = "URI")]
    pub uri: Option<String>,

    /// Database name to use
    #[arg(long = "db", global = true, value_name = "NAME")]
    pub database: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Documents requested from the server per batch
    #[arg(long, global = true, value_name = "N")]
    pub batch_size: Option<u32>,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream documents matching a filter
    Find {
        /// Collection name
        collection: String,

        /// Filter document (extended JSON)
        #[arg(long, default_value = "{}")]
        filter: String,

        /// Sort document (extended JSON)
        #[arg(long)]
        sort: Option<String>,

        /// Projection document (extended JSON)
        #[arg(long)]
        projection: Option<String>,

        /// Maximum number of documents
        #[arg(long)]
        limit: Option<i64>,

        /// Number of documents to skip
        #[arg(long)]
        skip: Option<u64>,

        /// Deliver in pages of N documents instead of an unbounded flow
        #[arg(long, value_name = "N")]
        fetch: Option<u64>,
    },

    /// Stream the results of an aggregation pipeline
    Aggregate {
        /// Collection name
        collection: String,

        /// Pipeline as a JSON array of stages
        #[arg(long)]
        pipeline: String,

        /// Allow stages to spill to disk
        #[arg(long)]
        allow_disk_use: bool,

        /// Deliver in pages of N documents instead of an unbounded flow
        #[arg(long, value_name = "N")]
        fetch: Option<u64>,
    },

    /// Check connectivity and print the server version
    Ping,

    /// Print the effective configuration as TOML
    Config,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, &args);
        config.validate()?;

        Ok(Self { args, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Override configuration values with CLI arguments where provided
    ///
    /// The database falls back to the one named in the URI.
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        if let Some(uri) = &args.uri {
            config.connection.connection_string = uri.clone();
            if args.database.is_none() {
                if let Some(db) = extract_database_from_uri(uri) {
                    config.connection.db_name = db;
                }
            }
        }
        if let Some(db) = &args.database {
            config.connection.db_name = db.clone();
        }
        if let Some(batch_size) = args.batch_size {
            config.stream.batch_size = batch_size;
        }
    }

    /// Run the selected subcommand
    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Commands::Config => {
                print!("{}", self.config.to_toml()?);
                Ok(())
            }
            Commands::Ping => self.ping().await,
            Commands::Find {
                collection,
                filter,
                sort,
                projection,
                limit,
                skip,
                fetch,
            } => {
                let mut options = FindOptions::new();
                if let Some(sort) = sort {
                    options = options.set_sort(parse_document("sort", sort)?);
                }
                if let Some(projection) = projection {
                    options = options.set_fields(parse_document("projection", projection)?);
                }
                if let Some(limit) = limit {
                    options = options.set_limit(*limit);
                }
                if let Some(skip) = skip {
                    options = options.set_skip(*skip);
                }
                let filter = parse_document("filter", filter)?;

                let client = self.connect().await?;
                let stream = client
                    .find_batch_with_options(collection, filter, options)
                    .await?;
                let outcome = print_stream(stream, *fetch).await;
                client.close().await?;
                outcome.map(|_| ())
            }
            Commands::Aggregate {
                collection,
                pipeline,
                allow_disk_use,
                fetch,
            } => {
                let pipeline = parse_pipeline(pipeline)?;
                let options = AggregateOptions::new().set_allow_disk_use(*allow_disk_use);

                let client = self.connect().await?;
                let stream = client
                    .aggregate_with_options(collection, pipeline, options)
                    .await?;
                let outcome = print_stream(stream, *fetch).await;
                client.close().await?;
                outcome.map(|_| ())
            }
        }
    }

    async fn connect(&self) -> Result<MongoClient> {
        info!(
            "Connecting to {}",
            sanitize_uri(&self.config.connection.connection_string)
        );
        let client = MongoClient::connect(self.config.clone()).await?;
        debug!("Using database '{}'", client.database_name());
        Ok(client)
    }

    async fn ping(&self) -> Result<()> {
        let client = self.connect().await?;
        let health = client.connection().health_check().await;
        let database = client.database_name().to_string();
        client.close().await?;
        let health = health?;

        println!(
            "{} on {} ({} ms, server {})",
            if health.is_healthy { "ok" } else { "unhealthy" },
            database,
            health.response_time_ms,
            health.server_version.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }
}

/// Print every document of `stream` as a JSON line
///
/// With `page_size`, documents are requested `page_size` at a time and the
/// next page is fetched once the previous one has been printed.
///
/// # Returns
/// * `Result<u64>` - Number of documents printed
pub async fn print_stream(stream: ReadStream, page_size: Option<u64>) -> Result<u64> {
    let failure: Arc<Mutex<Option<StreamError>>> = Arc::new(Mutex::new(None));
    let printed = Arc::new(Mutex::new(0u64));

    let slot = failure.clone();
    stream.exception_handler(move |e| {
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(e);
        }
    });

    if let Some(page_size) = page_size {
        stream.pause();
        stream.fetch(page_size)?;
    }

    let control = stream.control();
    let counter = printed.clone();
    stream.handler(move |doc: Document| {
        println!("{}", to_json_line(doc));

        let Ok(mut count) = counter.lock() else {
            return;
        };
        *count += 1;
        if let Some(page_size) = page_size {
            if *count % page_size == 0 {
                debug!("Page of {} documents printed (total: {})", page_size, *count);
                if let Err(e) = control.fetch(page_size) {
                    warn!("Failed to request the next page: {}", e);
                }
            }
        }
    });

    let state = stream.finished().await;
    let count = printed.lock().map(|c| *c).unwrap_or(0);
    info!("Stream {} after {} documents", state, count);

    if state == StreamState::Failed {
        let error = failure
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or(StreamError::Closed);
        return Err(error.into());
    }
    Ok(count)
}

/// Render a document as relaxed extended JSON on one line
fn to_json_line(doc: Document) -> String {
    Bson::Document(doc).into_relaxed_extjson().to_string()
}

/// Parse an extended JSON object given on the command line
pub fn parse_document(name: &str, text: &str) -> Result<Document> {
    match parse_extjson(name, text)? {
        Bson::Document(doc) => Ok(doc),
        _ => Err(invalid_arg(name, text)),
    }
}

/// Parse a JSON array of pipeline stages
pub fn parse_pipeline(text: &str) -> Result<Vec<Document>> {
    match parse_extjson("pipeline", text)? {
        Bson::Array(stages) => stages
            .into_iter()
            .map(|stage| match stage {
                Bson::Document(doc) => Ok(doc),
                other => Err(invalid_arg("pipeline", &other.to_string())),
            })
            .collect(),
        _ => Err(invalid_arg("pipeline", text)),
    }
}

fn parse_extjson(name: &str, text: &str) -> Result<Bson> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| invalid_arg(name, text))?;
    Bson::try_from(value).map_err(|_| invalid_arg(name, text))
}

fn invalid_arg(name: &str, value: &str) -> ClientError {
    ConfigError::InvalidValue {
        field: format!("--{name}"),
        value: value.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_database_from_uri() {
        assert_eq!(
            extract_database_from_uri("mongodb://localhost:27017/shop?retryWrites=true"),
            Some("shop".to_string())
        );
        assert_eq!(extract_database_from_uri("mongodb://localhost:27017"), None);
        assert_eq!(extract_database_from_uri("mongodb://localhost:27017/"), None);
    }

    #[test]
    fn test_sanitize_uri() {
        assert_eq!(
            sanitize_uri("mongodb://user:secret@db:27017/shop"),
            "mongodb://***@db:27017/shop"
        );
        assert_eq!(sanitize_uri("mongodb://db:27017"), "mongodb://db:27017");
    }

    #[test]
    fn test_parse_find_args() {
        let args = CliArgs::try_parse_from([
            "mongo-readstream",
            "find",
            "orders",
            "--sort",
            r#"{"foo": 1}"#,
            "--fetch",
            "100",
            "--db",
            "shop",
        ])
        .unwrap();

        assert_eq!(args.database.as_deref(), Some("shop"));
        match args.command {
            Commands::Find {
                collection,
                filter,
                sort,
                fetch,
                ..
            } => {
                assert_eq!(collection, "orders");
                assert_eq!(filter, "{}");
                assert_eq!(sort.as_deref(), Some(r#"{"foo": 1}"#));
                assert_eq!(fetch, Some(100));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_args_override_config() {
        let args = CliArgs::try_parse_from([
            "mongo-readstream",
            "--uri",
            "mongodb://db.internal:27017/inventory",
            "--batch-size",
            "500",
            "ping",
        ])
        .unwrap();

        let mut config = Config::default();
        CliInterface::apply_args_to_config(&mut config, &args);
        assert_eq!(
            config.connection.connection_string,
            "mongodb://db.internal:27017/inventory"
        );
        assert_eq!(config.connection.db_name, "inventory");
        assert_eq!(config.stream.batch_size, 500);
    }

    #[test]
    fn test_cli_flag_fixes_invalid_file_value() {
        let path = std::env::temp_dir().join(format!("cli-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[stream]\nbatch_size = 0\n").unwrap();
        let config_arg = path.display().to_string();

        let args = CliArgs::try_parse_from([
            "mongo-readstream",
            "--config",
            config_arg.as_str(),
            "--batch-size",
            "50",
            "config",
        ])
        .unwrap();
        let cli = CliInterface::from_args(args);
        std::fs::remove_file(&path).unwrap();

        let cli = cli.unwrap();
        assert_eq!(cli.config().stream.batch_size, 50);
    }

    #[test]
    fn test_invalid_file_value_rejected_without_override() {
        let path = std::env::temp_dir().join(format!("cli-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[stream]\nbatch_size = 0\n").unwrap();
        let config_arg = path.display().to_string();

        let args =
            CliArgs::try_parse_from(["mongo-readstream", "--config", config_arg.as_str(), "config"])
                .unwrap();
        let result = CliInterface::from_args(args);
        std::fs::remove_file(&path).unwrap();

        let err = result.err().unwrap();
        assert!(err.to_string().contains("stream.batch_size"));
    }

    /// Cursor over fixed batches of `{ n: i }` documents.
    struct PagedCursor {
        batches: std::collections::VecDeque<crate::stream::Batch>,
    }

    impl PagedCursor {
        fn new(count: i32, batch_size: usize) -> Self {
            let docs: Vec<bson::RawDocumentBuf> = (0..count)
                .map(|n| bson::RawDocumentBuf::from_document(&bson::doc! { "n": n }).unwrap())
                .collect();
            let chunks: Vec<_> = docs.chunks(batch_size).map(|c| c.to_vec()).collect();
            let last = chunks.len().saturating_sub(1);
            let batches = chunks
                .into_iter()
                .enumerate()
                .map(|(i, documents)| crate::stream::Batch {
                    documents,
                    has_more: i != last,
                })
                .collect();
            Self { batches }
        }
    }

    #[async_trait::async_trait]
    impl crate::stream::BatchCursor for PagedCursor {
        async fn next_batch(&mut self) -> std::result::Result<crate::stream::Batch, StreamError> {
            Ok(self.batches.pop_front().unwrap_or_default())
        }

        async fn close(&mut self) -> std::result::Result<(), StreamError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_print_stream_in_pages() {
        let stream: ReadStream = ReadStream::new(Box::new(PagedCursor::new(10, 4)));
        assert_eq!(print_stream(stream, Some(3)).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_print_stream_unbounded() {
        let stream: ReadStream = ReadStream::new(Box::new(PagedCursor::new(7, 2)));
        assert_eq!(print_stream(stream, None).await.unwrap(), 7);
    }

    #[test]
    fn test_parse_document_extended_json() {
        let doc = parse_document("filter", r#"{"n": {"$numberLong": "5"}, "foo": "bar"}"#).unwrap();
        assert_eq!(doc.get_i64("n").unwrap(), 5);
        assert_eq!(doc.get_str("foo").unwrap(), "bar");

        assert!(parse_document("filter", "[1, 2]").is_err());
        assert!(parse_document("filter", "{not json").is_err());
    }

    #[test]
    fn test_parse_pipeline() {
        let pipeline =
            parse_pipeline(r#"[{"$match": {"foo": "bar"}}, {"$count": "total"}]"#).unwrap();
        assert_eq!(pipeline.len(), 2);
        assert!(pipeline[1].contains_key("$count"));

        assert!(parse_pipeline(r#"[{"$match": {}}, 3]"#).is_err());
        assert!(parse_pipeline(r#"{"$match": {}}"#).is_err());
    }

    #[test]
    fn test_json_line_is_single_line() {
        let line = to_json_line(bson::doc! { "foo": "bar", "nested": { "n": 1 } });
        assert_eq!(line, r#"{"foo":"bar","nested":{"n":1}}"#);
    }
}
