use crate::cli::ServeArgs;
use crate::infra::{spawn_payment_logger, AppState, LoggingNotifier};
use crate::routes::with_ledger_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use school_ledger::config::AppConfig;
use school_ledger::documents::Letterhead;
use school_ledger::error::AppError;
use school_ledger::realtime::ChangeFeed;
use school_ledger::staff::{InMemoryStaffStore, StaffOnboardingService};
use school_ledger::telemetry;
use school_ledger::tuition::{InMemoryTuitionStore, TuitionService};
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

    let feed = ChangeFeed::new(config.ledger.change_feed_capacity);
    let tuition_store = InMemoryTuitionStore::with_feed(feed.clone());
    let staff_store = InMemoryStaffStore::with_feed(feed.clone());
    let tuition_service = Arc::new(TuitionService::new(
        Arc::new(tuition_store),
        config.ledger.status_policy(),
    ));
    let staff_service = Arc::new(StaffOnboardingService::new(
        Arc::new(staff_store.clone()),
        Arc::new(staff_store),
        Arc::new(LoggingNotifier::default()),
    ));
    let _payment_logger = spawn_payment_logger(&feed);

    let letterhead = Letterhead::named(config.ledger.school_name.clone());
    let app = with_ledger_routes(tuition_service, staff_service, letterhead)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        due_soon_days = config.ledger.due_soon_days,
        "school ledger ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
