use tlt_server::config::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(addr = %config.bind_addr, "starting TieLessTris server");

    let (listener, state) = tlt_server::build_server(&config).await?;
    tlt_server::serve(listener, state).await?;
    Ok(())
}
