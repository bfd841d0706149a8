use event_match::config::AppConfig;
use event_match::error::AppError;
use event_match::matchmaking::{EventMatchService, EventStore, MatchingEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// File-backed store when `APP_DATA_PATH` is set, otherwise an empty in-memory one.
pub(crate) fn open_store(config: &AppConfig) -> Result<EventStore, AppError> {
    match &config.storage.data_path {
        Some(path) => {
            let store = EventStore::open(path.clone())?;
            info!(path = %path.display(), "event data file opened");
            Ok(store)
        }
        None => {
            warn!("APP_DATA_PATH is not set; event data lives in memory only");
            Ok(EventStore::in_memory())
        }
    }
}

pub(crate) fn build_service(
    config: &AppConfig,
) -> Result<Arc<EventMatchService<EventStore>>, AppError> {
    let store = open_store(config)?;
    let engine = MatchingEngine::new(config.matching.match_limit);
    Ok(Arc::new(EventMatchService::new(Arc::new(store), engine)))
}
