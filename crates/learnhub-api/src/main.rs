use anyhow::Context;
use learnhub_api::Server;
use learnhub_core::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learnhub=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env().context("resolving settings from the environment")?;
    let server = Server::new(settings).context("constructing the API server")?;
    server.run().await.context("running the API server")?;
    Ok(())
}
