//! HTTP serving for the exoplanet classifier
//!
//! Exposes the trained pipeline as a small JSON API. The model bundle is
//! loaded (or trained, depending on the startup policy) once before the
//! listener binds, then shared read-only across requests.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::system::{ClassificationSystem, StartupPolicy, SystemConfig};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub models_dir: PathBuf,
    /// Train on a generated catalog when no bundle exists
    pub train_if_missing: bool,
    pub cors_origin: Option<String>,
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            models_dir: std::env::var("MODELS_DIR")
                .unwrap_or_else(|_| "./models".to_string())
                .into(),
            train_if_missing: env_flag("TRAIN_IF_MISSING", true),
            cors_origin: std::env::var("CORS_ORIGIN").ok(),
        }
    }
}

impl ServerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn startup_policy(&self) -> StartupPolicy {
        if self.train_if_missing {
            StartupPolicy::TrainIfMissing
        } else {
            StartupPolicy::RequireBundle
        }
    }
}

/// Load the model and serve until ctrl+c
pub async fn run_server(config: ServerConfig, system_config: SystemConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        models_dir = %config.models_dir.display(),
        policy = ?config.startup_policy(),
        "Loading classification system"
    );

    let dir = config.models_dir.clone();
    let policy = config.startup_policy();
    let system = tokio::task::spawn_blocking(move || {
        ClassificationSystem::load_or_train(&dir, &system_config, policy)
    })
    .await??;

    let state = Arc::new(AppState::new(config.clone(), system));
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        pid = std::process::id(),
        started_at = %start_time.to_rfc3339(),
        "Exoplanet API listening"
    );

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install ctrl+c handler");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::default()
            .with_host("127.0.0.1")
            .with_port(9000)
            .with_models_dir("/tmp/exoplanet-models");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.models_dir, PathBuf::from("/tmp/exoplanet-models"));
    }

    #[test]
    fn test_startup_policy() {
        let mut config = ServerConfig::default();
        config.train_if_missing = true;
        assert_eq!(config.startup_policy(), StartupPolicy::TrainIfMissing);
        config.train_if_missing = false;
        assert_eq!(config.startup_policy(), StartupPolicy::RequireBundle);
    }
}
