use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState};
use crate::routes::with_event_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use event_match::config::AppConfig;
use event_match::error::AppError;
use event_match::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = build_service(&config)?;

    let app = with_event_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        match_limit = config.matching.match_limit,
        "event matchmaking service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
