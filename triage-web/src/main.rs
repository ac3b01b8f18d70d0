use triage_web::WebConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("triage_core=info".parse()?)
                .add_directive("triage_web=info".parse()?),
        )
        .init();

    tracing::info!("Starting Triage web server");

    let config = match WebConfig::load() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully, port: {}", config.port);
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    triage_web::serve(config).await
}
