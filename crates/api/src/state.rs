use std::sync::Arc;

use blackroad_db::Ledgers;
use blackroad_pipeline::{BridgeConfig, StreamBridge, StreamRegistry};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: blackroad_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Operation and transcript ledgers sharing one writer lock.
    pub ledgers: Ledgers,
    /// Log subscribers (`/ws/logs`); every stream's lines are published here.
    pub ws_manager: Arc<WsManager>,
    /// Live streams by job id.
    pub streams: StreamRegistry,
    pub bridge: StreamBridge,
}

impl AppState {
    pub fn new(pool: blackroad_db::DbPool, config: ServerConfig) -> Self {
        let ledgers = Ledgers::with_caps(
            pool.clone(),
            config.job_output_cap_bytes,
            config.transcript_cap_bytes,
        );
        let bridge = StreamBridge::new(BridgeConfig {
            cancel_grace: config.cancel_grace(),
            ..BridgeConfig::default()
        });

        Self {
            pool,
            config: Arc::new(config),
            ledgers,
            ws_manager: Arc::new(WsManager::new()),
            streams: StreamRegistry::new(),
            bridge,
        }
    }
}
