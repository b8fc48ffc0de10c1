use crate::cli::ServeArgs;
use crate::infra::{
    seed_dev_fixtures, AppState, InMemoryFleetStore, InMemoryPenaltyStore, InMemoryStaffDirectory,
    LogMailer,
};
use crate::routes::with_penalty_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use fleet_ops::config::AppConfig;
use fleet_ops::error::AppError;
use fleet_ops::telemetry;
use fleet_ops::workflows::penalties::{DeductionService, PenaltyApi, PenaltyCatalog};
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

    let penalties = Arc::new(InMemoryPenaltyStore::default());
    let fleet = Arc::new(InMemoryFleetStore::default());
    let staff = Arc::new(InMemoryStaffDirectory::default());
    let mailer = Arc::new(LogMailer);
    seed_dev_fixtures(&fleet, &staff);

    let catalog = Arc::new(PenaltyCatalog::new(penalties.clone()));
    let engine = Arc::new(DeductionService::new(
        penalties,
        fleet,
        staff,
        mailer,
    ));
    let api = Arc::new(PenaltyApi::new(catalog, engine));

    let app = with_penalty_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "fleet penalty service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
