use std::sync::Arc;

use storefront_orders::config::{Config, LogFormat};
use storefront_orders::engine::notify::run_notification_dispatcher;
use storefront_orders::engine::push::{LogPushSender, PushSender, WebhookPushSender};
use storefront_orders::error::AppError;
use storefront_orders::state::AppState;
use storefront_orders::api;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let push: Arc<dyn PushSender> = match &config.push_webhook_url {
        Some(url) => {
            tracing::info!(push_webhook_url = %url, "push notifications via webhook");
            Arc::new(WebhookPushSender::new(url.clone())?)
        }
        None => Arc::new(LogPushSender),
    };

    let (app_state, notification_rx) =
        AppState::with_push(config.notification_queue_size, config.event_buffer_size, push);
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_notification_dispatcher(
        shared_state.clone(),
        notification_rx,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
