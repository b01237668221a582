//! Shared test helpers for the simulator service.

use std::sync::Arc;

use crate::client::SimRegistry;
use crate::config::{Config, GcpConfig, ServerConfig};
use crate::target::TargetKind;
use crate::AppState;

/// Create a test AppState whose registry already holds empty `buckets`.
pub async fn test_state(buckets: &[&str]) -> Arc<AppState> {
    let config = Config {
        target: TargetKind::Sim,
        state_dir: "./.state".to_string(),
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
        },
        gcp: GcpConfig::default(),
        test_mode: true,
    };

    let registry = SimRegistry::new();
    for name in buckets {
        registry.get_or_create(name).await;
    }

    Arc::new(AppState { config, registry })
}
