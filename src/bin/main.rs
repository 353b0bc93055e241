use anyhow::{Context, Result};
use chart_engine::settings::get_config;
use chart_engine::{AppState, init_openapi_route};
use poem::listener::TcpListener;

use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = get_config()?;

    let log_level = config.tracing_level()?;
    // Logging to File
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(log_level)
        .init();

    tracing::info!("Initializing Chart Service...");
    if config.uses_env_file() {
        tracing::info!("using .env file as environtment variable");
    } else {
        tracing::info!("using server environtment as environtment variable");
    }
    tracing::info!("run with config: {:?}", config);

    // Init App State
    let app_state = Arc::new(AppState::from_config(&config));
    let engine = app_state.engine.clone();

    tracing::info!("Rendering engine initialized successfully");

    let app = init_openapi_route(app_state, &config);
    tracing::info!("run server on {}:{}", config.host, config.port);
    poem::Server::new(TcpListener::bind(format!(
        "{}:{}",
        config.host, config.port
    )))
    .run_with_graceful_shutdown(
        app,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
        Some(Duration::from_secs(5)),
    )
    .await
    .context("server error")?;

    engine.shutdown();
    Ok(())
}
