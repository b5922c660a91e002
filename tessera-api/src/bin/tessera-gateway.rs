//! Tessera Gateway Entry Point
//!
//! Loads configuration, binds every instance found in the data directory and
//! serves the gateway until Ctrl-C.

use tessera_api::{
    create_gateway_router, init_tracing, ApiError, ApiResult, GatewayConfig, OrchestratorConfig,
    TelemetryConfig,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let config = GatewayConfig::from_env();
    config.validate_for_production()?;

    let orchestrator_config = OrchestratorConfig::from_env();
    let registry = orchestrator_config.registry()?;
    let loaded = registry.load_existing()?;
    tracing::info!(
        data_dir = ?orchestrator_config.data_dir,
        instances = loaded,
        "Instance registry ready"
    );

    let app = create_gateway_router(registry, &config);

    let addr = config.bind_addr()?;
    tracing::info!(%addr, "Starting Tessera gateway");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
