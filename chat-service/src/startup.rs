//! Application startup and lifecycle management.
//!
//! Wires the provider, optional store and router from [`ChatConfig`] and runs
//! the HTTP server until a shutdown signal arrives.

use crate::config::ChatConfig;
use crate::handlers::{
    chat::{chat, method_not_allowed, preflight},
    health::{health_check, metrics, readiness_check},
};
use crate::services::metrics::init_metrics;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::TextProvider;
use crate::services::{ChatService, ConnectionCache, MongoConnector, WriteFailurePolicy};
use axum::{
    http::Request,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub cors_enabled: bool,
}

impl AppState {
    pub fn new(chat: ChatService, cors_enabled: bool) -> Self {
        Self {
            chat: Arc::new(chat),
            cors_enabled,
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any)
}

/// Build the HTTP router. The chat endpoint is served at both `/api/chat`
/// and `/chat`.
///
/// With CORS on, `OPTIONS` is answered by [`preflight`] and every other
/// response carries `Access-Control-Allow-Origin`.
pub fn build_router(state: AppState) -> Router {
    let mut chat_route = post(chat).fallback(method_not_allowed);
    if state.cors_enabled {
        chat_route = chat_route.layer(cors_layer()).options(preflight);
    }

    let chat_routes = Router::new()
        .route("/api/chat", chat_route.clone())
        .route("/chat", chat_route);

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .merge(chat_routes)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Assemble the chat core from configuration.
pub fn build_chat_service(config: &ChatConfig) -> Result<ChatService, AppError> {
    let gemini_config = GeminiConfig::new(
        config.google.api_key.clone(),
        config.models.text_model.clone(),
    );
    let text_provider: Arc<dyn TextProvider> = Arc::new(
        GeminiTextProvider::new(gemini_config)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e.to_string())))?,
    );

    tracing::info!(
        model = %config.models.text_model,
        "Initialized Gemini text provider"
    );

    let policy = if config.persistence.return_reply_on_write_failure {
        WriteFailurePolicy::ReturnReply
    } else {
        WriteFailurePolicy::Fail
    };
    let mut service = ChatService::new(text_provider).with_write_failure_policy(policy);

    match &config.mongodb {
        Some(mongo) => {
            // Connected lazily on the first chat request.
            let cache = ConnectionCache::new(Arc::new(MongoConnector::new(mongo.clone())));
            service = service.with_persistence(Arc::new(cache));
            tracing::info!(
                database = %mongo.database,
                collection = %mongo.collection,
                write_failure_policy = ?policy,
                "Chat exchange persistence enabled"
            );
        }
        None => tracing::info!("Chat exchange persistence disabled"),
    }

    Ok(service)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        init_metrics().map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?;

        let service = build_chat_service(&config)?;
        let state = AppState::new(service, config.http.cors_enabled);

        // Port 0 picks a random port (tests).
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            cors_enabled = config.http.cors_enabled,
            "Chat service listening on http://localhost:{}",
            port
        );

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
