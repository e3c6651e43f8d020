//! Application state management

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::system::ClassificationSystem;

use super::ServerConfig;

/// Application state shared across handlers
///
/// The system is immutable once loaded, so handlers read it without locking.
pub struct AppState {
    pub config: ServerConfig,
    pub system: Arc<ClassificationSystem>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, system: ClassificationSystem) -> Self {
        Self {
            config,
            system: Arc::new(system),
            started_at: Utc::now(),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.system.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untrained_state() {
        let state = AppState::new(ServerConfig::default(), ClassificationSystem::new());
        assert!(!state.model_loaded());
        assert!(state.started_at <= Utc::now());
    }
}
