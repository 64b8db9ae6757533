//! Taskflow server binary.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskflow::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("taskflow=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        database = %config.database_path.display(),
        dev_mode = config.dev_mode,
        "Starting taskflow {}",
        env!("CARGO_PKG_VERSION")
    );

    api::serve(config).await
}
