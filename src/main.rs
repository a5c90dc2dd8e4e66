use clap::Parser;
use tracing_subscriber::EnvFilter;

use gitdocs::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let config = Config::parse();
    tracing::info!(
        api = %config.gitlab_api,
        branch = %config.branch,
        asset_dir = %config.asset_dir,
        backend = ?config.backend,
        "starting"
    );

    gitdocs::server::run(config).await
}
