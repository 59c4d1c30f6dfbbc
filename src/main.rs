use dotenvy::dotenv;
use kinobot::config::Config;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().inspect_err(|e| error!(error = %e, "invalid configuration"))?;
    kinobot::run(config).await.inspect_err(|e| error!(error = %e, "kinobot failed"))?;
    Ok(())
}
