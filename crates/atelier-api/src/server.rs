//! Main server implementation for the Atelier API gateway

use crate::{
    api,
    config::Config,
    error::{ApiError, Result},
    provisioning::AccountProvisioner,
};
use atelier_auth::{
    spawn_refresh_task, AccessPolicy, HttpKeySetSource, KeySetCache, KeySetSource,
    RoleScopeRegistry, TokenValidator,
};
use axum::Router;
use std::sync::Arc;
use tokio::{signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

/// Main server structure
pub struct Server {
    config: Arc<Config>,
    app: Router,
    shutdown: CancellationToken,
    refresh_task: JoinHandle<()>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,

    /// Signing key cache shared with the refresh task
    pub key_cache: Arc<KeySetCache>,

    pub validator: Arc<TokenValidator>,

    pub registry: Arc<RoleScopeRegistry>,

    pub policy: AccessPolicy,

    /// Creates local accounts for first-seen humans
    pub provisioner: Arc<dyn AccountProvisioner>,
}

impl AppState {
    /// Wire the auth components around an initialized key cache
    pub fn new(
        config: Arc<Config>,
        key_cache: Arc<KeySetCache>,
        provisioner: Arc<dyn AccountProvisioner>,
    ) -> Self {
        let validator = Arc::new(TokenValidator::new(
            key_cache.clone(),
            config.auth.validation_settings(),
        ));
        Self {
            policy: AccessPolicy::new(config.auth.service_tenant_binding),
            registry: Arc::new(RoleScopeRegistry::new()),
            config,
            key_cache,
            validator,
            provisioner,
        }
    }
}

impl Server {
    /// Create a new server instance
    ///
    /// Fails when the identity provider's key set cannot be loaded.
    pub async fn new(config: Config, provisioner: Arc<dyn AccountProvisioner>) -> Result<Self> {
        let jwks_url = config.auth.jwks_url()?;
        let source = HttpKeySetSource::new(
            jwks_url.clone(),
            config.auth.cache_settings().fetch_timeout,
        )
        .map_err(|e| ApiError::Internal {
            message: format!("Failed to create JWKS client: {e}"),
        })?;

        info!("Loading signing keys from {}", jwks_url);
        Self::with_source(config, Arc::new(source), provisioner).await
    }

    /// Create a server that reads keys from an arbitrary source
    pub async fn with_source(
        config: Config,
        source: Arc<dyn KeySetSource>,
        provisioner: Arc<dyn AccountProvisioner>,
    ) -> Result<Self> {
        info!("Initializing Atelier API gateway");

        let config = Arc::new(config);
        let key_cache =
            Arc::new(KeySetCache::initialize(source, config.auth.cache_settings()).await?);

        let shutdown = CancellationToken::new();
        let refresh_task = spawn_refresh_task(key_cache.clone(), shutdown.clone());

        let state = AppState::new(config.clone(), key_cache, provisioner);
        let app = build_router(state);

        Ok(Self {
            config,
            app,
            shutdown,
            refresh_task,
        })
    }

    /// Router with all routes and middleware applied
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Stop the background key refresh without serving
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.refresh_task.await {
            warn!("Key set refresh task ended abnormally: {}", e);
        }
    }

    /// Run the server until shutdown signal
    pub async fn run(self) -> Result<()> {
        let addr = self.config.server.bind_address;

        info!("Starting HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::Internal {
                message: format!("Failed to bind to address {addr}: {e}"),
            })?;

        info!("Atelier API gateway listening on {}", addr);

        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        self.shutdown.cancel();
        if let Err(e) = self.refresh_task.await {
            warn!("Key set refresh task ended abnormally: {}", e);
        }

        served.map_err(|e| ApiError::Internal {
            message: format!("Server error: {e}"),
        })
    }
}

/// Build the application router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors);

    Router::new()
        .nest(&format!("/api/{}", crate::API_VERSION), api::routes(state.clone()))
        .merge(api::health_routes())
        .layer(middleware)
        .with_state(state)
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            warn!("Received terminate signal, shutting down");
        },
    }
}
