use fbx_proxy::api::ApiServer;
use fbx_proxy::api::server::AppState;
use fbx_proxy::config::AppConfig;
use fbx_proxy::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();

    // Keep the guard alive so buffered file output is flushed on exit
    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;

    tracing::info!(
        freebox = %config.freebox.api_url,
        data_dir = %config.data_dir.display(),
        "Starting fbx-proxy v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = AppState::from_config(&config)?;
    let server = ApiServer::with_state(config.server.clone(), state);

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Received Ctrl-C, shutting down");
        cancel_token.cancel();
    });

    server.run().await?;

    tracing::info!("fbx-proxy stopped");
    Ok(())
}
