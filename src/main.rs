//! mongo-readstream command-line tool
//!
//! Runs a `find` or `aggregate` against MongoDB and prints each document as a
//! JSON line, either as an unbounded flow or in pages of `--fetch N`.
//!
//! # Usage
//!
//! ```bash
//! mongo-readstream --uri mongodb://localhost:27017/shop find orders --sort '{"foo": 1}'
//! mongo-readstream find orders --fetch 100
//! ```

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use mongo_readstream::cli::CliInterface;
use mongo_readstream::error::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Parse arguments, set up logging and run the selected subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    cli.run().await
}

/// Initialize the tracing subscriber
///
/// `-v` / `--vv` take precedence over the configured level; `RUST_LOG`
/// directives are layered on top. Logs go to stderr so stdout carries only
/// documents.
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
