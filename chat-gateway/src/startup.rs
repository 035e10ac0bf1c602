//! Application startup and lifecycle management.

use axum::{
    http::{header, request, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, post, MethodRouter},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    cors::{AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ChatConfig;
use crate::handlers;
use crate::services::{
    FcmLegacyProvider, MemoryStore, MockPushProvider, OriginPolicy, PostgrestStore, PushProvider,
    Stores,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    pub stores: Stores,
    pub push_provider: Arc<dyn PushProvider>,
    pub origin_policy: OriginPolicy,
}

impl AppState {
    pub fn new(
        config: ChatConfig,
        stores: Stores,
        push_provider: Arc<dyn PushProvider>,
    ) -> Result<Self, AppError> {
        let origin_policy = OriginPolicy::new(&config.gateway.parent_domain).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "invalid parent domain '{}': {}",
                config.gateway.parent_domain,
                e
            ))
        })?;

        Ok(Self {
            config,
            stores,
            push_provider,
            origin_policy,
        })
    }

    /// Build the store and push provider the configuration asks for.
    ///
    /// Outside dev mode the real clients are always built, so missing
    /// credentials surface as errors from the dependency itself.
    pub fn from_config(config: ChatConfig) -> Result<Self, AppError> {
        if config.dev_mode {
            tracing::info!("Dev mode, using in-memory store and mock push provider");
            let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
            return Self::new(config, stores, Arc::new(MockPushProvider::new(true)));
        }

        let stores = Stores::from_backend(Arc::new(PostgrestStore::new(
            &config.database.url,
            config.database.anon_key.clone(),
        )));
        tracing::info!("PostgREST store initialized");

        let push_provider: Arc<dyn PushProvider> =
            Arc::new(FcmLegacyProvider::new(config.fcm.clone()));
        tracing::info!("FCM push provider initialized");

        Self::new(config, stores, push_provider)
    }
}

fn page_methods() -> Vec<Method> {
    vec![Method::GET, Method::HEAD]
}

fn api_methods() -> Vec<Method> {
    vec![
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::OPTIONS,
    ]
}

fn notify_methods() -> Vec<Method> {
    vec![Method::POST, Method::OPTIONS]
}

/// Answer any method the route does not define with 405 and an exact `Allow`.
fn reject_other_methods(route: MethodRouter<AppState>, allow: Vec<Method>) -> MethodRouter<AppState> {
    route.fallback(move |method: Method| {
        let allow = allow.clone();
        async move { AppError::MethodNotAllowed { method, allow } }
    })
}

/// CORS for browser callers on subdomains of the parent domain. The matching
/// origin is echoed back.
fn cors_layer(policy: &OriginPolicy, methods: Vec<Method>) -> CorsLayer {
    let policy = policy.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &request::Parts| {
                origin
                    .to_str()
                    .map(|origin| policy.is_allowed(origin))
                    .unwrap_or(false)
            },
        ))
        .allow_methods(AllowMethods::list(methods))
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the HTTP router. Public so tests can drive it with `oneshot`.
pub fn build_router(state: AppState) -> Router {
    let policy = &state.origin_policy;

    let index = reject_other_methods(get(handlers::index), page_methods());
    let sign_up = reject_other_methods(get(handlers::sign_up_script), page_methods());

    let api = reject_other_methods(
        post(handlers::create_message)
            .get(handlers::get_api)
            .put(handlers::upsert_user)
            .options(handlers::preflight),
        api_methods(),
    )
    .layer(cors_layer(policy, api_methods()));

    let send = reject_other_methods(
        post(handlers::send_notification).options(handlers::preflight),
        notify_methods(),
    )
    .layer(cors_layer(policy, notify_methods()));

    let subscribe = reject_other_methods(
        post(handlers::subscribe).options(handlers::preflight),
        notify_methods(),
    )
    .layer(cors_layer(policy, notify_methods()));

    Router::new()
        .route("/", index)
        .route("/sign-up", sign_up)
        .route("/api", api)
        .route("/send", send)
        .route("/subscribe", subscribe)
        .route(
            "/health",
            reject_other_methods(get(handlers::health_check), page_methods()),
        )
        .route(
            "/ready",
            reject_other_methods(get(handlers::readiness_check), page_methods()),
        )
        .route(
            "/metrics",
            reject_other_methods(get(handlers::metrics_endpoint), page_methods()),
        )
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
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

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        let state = AppState::from_config(config)?;
        Self::build_with_state(state).await
    }

    /// Bind a listener for an already assembled state (port 0 = random port).
    pub async fn build_with_state(state: AppState) -> Result<Self, AppError> {
        let address = state.config.common.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Chat gateway listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
