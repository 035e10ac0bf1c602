use chat_gateway::config::ChatConfig;
use chat_gateway::services::init_metrics;
use chat_gateway::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let config = ChatConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "chat-gateway",
        &config.common.log_level,
        config.otlp_endpoint.as_deref(),
    );

    config.warn_on_missing_credentials();

    if let Err(e) = init_metrics() {
        tracing::warn!("Failed to install metrics recorder: {}", e);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        merge_strategy = %config.gateway.merge_strategy,
        parent_domain = %config.gateway.parent_domain,
        "Starting chat gateway"
    );

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    application.run_until_stopped().await
}
