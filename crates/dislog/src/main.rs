use std::sync::Arc;

use clap::Parser;
use dislog::{AppConfig, Cli, Dispatcher};
use dislog::signal::shutdown_signal;
use dislog_logging::DislogSubscriberBuilder;
use dislog_storage::{EventLogger, Lifecycle};
use tokio::io::BufReader;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::resolve(&cli)?;

    let _log_guard = DislogSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli, config));

    // A pending stdin read sits on a blocking thread; don't wait for it
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    info!(base_dir = %config.storage.base_dir.display(), "Starting dislog");

    let logger = Arc::new(EventLogger::new(config.storage));
    let lifecycle = Lifecycle::new(logger.clone());
    let dispatcher = Dispatcher::new(logger);

    let outcome = match &cli.input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            dispatcher.run(BufReader::new(file), shutdown_signal()).await
        }
        None => {
            dispatcher
                .run(BufReader::new(tokio::io::stdin()), shutdown_signal())
                .await
        }
    };

    // Files are closed even if reading failed
    lifecycle.shutdown().await;

    let (reason, stats) = outcome?;
    info!(reason = ?reason, logged = stats.logged, "dislog stopped");
    Ok(())
}
