//! HTTP surface of the endpoint: a liveness root and the subscription route

pub mod handlers;

use axum::{routing::get, Router};
use edgeup_control::Pipeline;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Pipeline,
}

pub struct ApiServer {
    bind_addr: SocketAddr,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(bind_addr: SocketAddr, pipeline: Pipeline) -> Self {
        Self {
            bind_addr,
            state: Arc::new(AppState { pipeline }),
        }
    }

    /// Subscription route path, `None` when it would shadow the root
    fn subscription_path(&self) -> Option<String> {
        let sub_path = self.state.pipeline.config().sub_path.trim_matches('/');
        (!sub_path.is_empty()).then(|| format!("/{}", sub_path))
    }

    pub fn build_router(&self) -> Router {
        let mut router = Router::new().route("/", get(handlers::root));

        match self.subscription_path() {
            Some(path) => router = router.route(&path, get(handlers::subscription)),
            None => warn!("SUB_PATH is empty, subscription route disabled"),
        }

        router
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("HTTP server is running on port {}", self.bind_addr.port());
        if let Some(path) = self.subscription_path() {
            info!("Subscription: http://{}{}", self.bind_addr, path);
        }

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}
