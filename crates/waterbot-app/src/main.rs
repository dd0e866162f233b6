use waterbot_app::{PlaceholderService, ServeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = ServeConfig::load()?;
    waterbot_app::serve(PlaceholderService::new(), &config).await?;

    Ok(())
}
