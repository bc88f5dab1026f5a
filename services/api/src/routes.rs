use crate::infra::{deserialize_optional_date, AppState};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{Local, NaiveDate};
use school_ledger::documents::{document_router, DocumentRenderer, Letterhead, PdfRenderer};
use school_ledger::error::AppError;
use school_ledger::staff::{
    staff_router, PayrollLedger, StaffNotifier, StaffOnboardingService, UserDirectory,
};
use school_ledger::tuition::{
    allocate, classify, format_xof, tuition_router, AcademicYear, AllocationBreakdown,
    AllocationInput, PaymentStatus, ScheduleEntry, StatusPolicy, TuitionRepository,
    TuitionService, TuitionServiceError, Xof,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct AllocationPreviewRequest {
    pub(crate) academic_year: AcademicYear,
    #[serde(default)]
    pub(crate) registration_fee: Xof,
    #[serde(default)]
    pub(crate) other_fees: Xof,
    pub(crate) tuition_amount: Xof,
    #[serde(default)]
    pub(crate) schedule: Vec<ScheduleEntry>,
    pub(crate) total_paid: Xof,
    #[serde(default)]
    pub(crate) first_payment_amount: Option<Xof>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PreviewLine {
    pub(crate) label: String,
    pub(crate) due: String,
    pub(crate) paid: String,
    pub(crate) balance: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AllocationPreviewResponse {
    pub(crate) today: NaiveDate,
    pub(crate) breakdown: AllocationBreakdown,
    pub(crate) lines: Vec<PreviewLine>,
    pub(crate) status: PaymentStatus,
    pub(crate) status_label: String,
}

pub(crate) fn with_ledger_routes<R, D, P, N>(
    tuition: Arc<TuitionService<R>>,
    staff: Arc<StaffOnboardingService<D, P, N>>,
    letterhead: Letterhead,
) -> Router
where
    R: TuitionRepository + 'static,
    D: UserDirectory + 'static,
    P: PayrollLedger + 'static,
    N: StaffNotifier + 'static,
{
    let renderer: Arc<dyn DocumentRenderer> = Arc::new(PdfRenderer);
    let policy = tuition.policy();
    tuition_router(tuition, Arc::clone(&renderer), letterhead.clone())
        .merge(staff_router(staff))
        .merge(document_router(renderer, letterhead))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/allocation/preview",
            post(allocation_preview_endpoint).layer(Extension(policy)),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Run the waterfall on an ad-hoc fee structure without touching the ledger. The badge uses the
/// same due-soon window as stored statements.
pub(crate) async fn allocation_preview_endpoint(
    Extension(policy): Extension<StatusPolicy>,
    Json(payload): Json<AllocationPreviewRequest>,
) -> Result<Json<AllocationPreviewResponse>, AppError> {
    let input = AllocationInput {
        total_paid: payload.total_paid,
        registration_fee: payload.registration_fee,
        other_fees: payload.other_fees,
        tuition_amount: payload.tuition_amount,
        schedule: &payload.schedule,
        first_payment_amount: payload.first_payment_amount,
        academic_year: payload.academic_year,
    };
    input.check().map_err(TuitionServiceError::from)?;

    let today = payload.today.unwrap_or_else(|| Local::now().date_naive());
    let breakdown = allocate(&input);
    let status = classify(Some(&breakdown), today, policy);
    let lines = breakdown
        .rows()
        .into_iter()
        .map(|row| PreviewLine {
            label: row.label,
            due: format_xof(row.due),
            paid: format_xof(row.paid),
            balance: format_xof(row.balance),
        })
        .collect();

    Ok(Json(AllocationPreviewResponse {
        today,
        breakdown,
        lines,
        status,
        status_label: status.label(),
    }))
}
