//! taskdash command line
//!
//! A terminal front end over the task store. Backend and seeding are
//! configured through `TASKDASH_*` environment variables.

mod commands;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskdash_core::config::DashboardConfig;
use taskdash_core::store::TaskStore;

#[derive(Parser, Debug)]
#[command(name = "taskdash", version, about = "Manage dashboard tasks")]
struct Args {
    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskdash=info,taskdash_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = DashboardConfig::from_env()?;

    let store = TaskStore::new(config.connect().await?);
    let importer = config.importer()?;
    store.load(importer.as_ref()).await?;
    if let Some(message) = store.last_error().await {
        tracing::warn!("{}", message);
        store.clear_error().await;
    }

    args.command.execute(&store).await
}
