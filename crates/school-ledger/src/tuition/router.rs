use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{ClassId, PaymentId, StudentId};
use super::repository::{RepositoryError, TuitionRepository};
use super::service::{
    NewClass, NewPayment, NewStudent, TuitionFeeDraft, TuitionService, TuitionServiceError,
};
use crate::documents::{
    class_status_sheet, receipt_layout, Attachment, DocumentRenderer, Letterhead, RenderError,
};
use crate::session::{SchoolSession, SessionError};

/// Shared state of the tuition endpoints.
pub struct TuitionRoutes<R> {
    pub service: Arc<TuitionService<R>>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub letterhead: Letterhead,
}

impl<R> Clone for TuitionRoutes<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            renderer: Arc::clone(&self.renderer),
            letterhead: self.letterhead.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AsOf {
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

impl AsOf {
    fn date(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

pub fn tuition_router<R>(
    service: Arc<TuitionService<R>>,
    renderer: Arc<dyn DocumentRenderer>,
    letterhead: Letterhead,
) -> Router
where
    R: TuitionRepository + 'static,
{
    Router::new()
        .route("/api/v1/classes", post(create_class_handler::<R>))
        .route("/api/v1/students", post(enroll_handler::<R>))
        .route(
            "/api/v1/classes/:class_id/tuition-fee",
            put(define_fee_handler::<R>),
        )
        .route(
            "/api/v1/classes/:class_id/payment-status",
            get(class_status_handler::<R>),
        )
        .route(
            "/api/v1/classes/:class_id/payment-status/export",
            get(class_status_export_handler::<R>),
        )
        .route(
            "/api/v1/students/:student_id/payments",
            post(record_payment_handler::<R>),
        )
        .route(
            "/api/v1/students/:student_id/statement",
            get(statement_handler::<R>),
        )
        .route(
            "/api/v1/students/:student_id/payments/:payment_id/receipt",
            get(receipt_handler::<R>),
        )
        .route("/api/v1/treasury/report", get(treasury_handler::<R>))
        .with_state(TuitionRoutes {
            service,
            renderer,
            letterhead,
        })
}

fn session(headers: &HeaderMap) -> Result<SchoolSession, TuitionServiceError> {
    SchoolSession::from_headers(headers).map_err(TuitionServiceError::from)
}

pub(crate) fn status_for(error: &TuitionServiceError) -> StatusCode {
    match error {
        TuitionServiceError::Session(SessionError::Forbidden { .. }) => StatusCode::FORBIDDEN,
        TuitionServiceError::Session(_) => StatusCode::BAD_REQUEST,
        TuitionServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TuitionServiceError::ClassNotFound(_)
        | TuitionServiceError::StudentNotFound(_)
        | TuitionServiceError::PaymentNotFound(_)
        | TuitionServiceError::NoTuitionFee(_)
        | TuitionServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        TuitionServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        TuitionServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: TuitionServiceError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        warn!(error = %error, "tuition request failed");
    }
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn render_failure(error: RenderError) -> Response {
    warn!(error = %error, "document rendering failed");
    let payload = json!({ "error": error.to_string() });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, TuitionServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_class_handler<R>(
    State(routes): State<TuitionRoutes<R>>,
    headers: HeaderMap,
    Json(request): Json<NewClass>,
) -> Response
where
    R: TuitionRepository + 'static,
{
    let result =
        session(&headers).and_then(|session| routes.service.create_class(&session, request));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn enroll_handler<R>(
    State(routes): State<TuitionRoutes<R>>,
    headers: HeaderMap,
    Json(request): Json<NewStudent>,
) -> Response
where
    R: TuitionRepository + 'static,
{
    let result =
        session(&headers).and_then(|session| routes.service.enroll_student(&session, request));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn define_fee_handler<R>(
    State(routes): State<TuitionRoutes<R>>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
    Json(draft): Json<TuitionFeeDraft>,
) -> Response
where
    R: TuitionRepository + 'static,
{
    let class_id = ClassId(class_id);
    let result = session(&headers)
        .and_then(|session| routes.service.define_tuition_fee(&session, &class_id, draft));
    respond(StatusCode::OK, result)
}

pub(crate) async fn record_payment_handler<R>(
    State(routes): State<TuitionRoutes<R>>,
    headers: HeaderMap,
    Path(student_id): Path<String>,
    Json(request): Json<NewPayment>,
) -> Response
where
    R: TuitionRepository + 'static,
{
    let student_id = StudentId(student_id);
    let result = session(&headers)
        .and_then(|session| routes.service.record_payment(&session, &student_id, request));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn statement_handler<R>(
    State(routes): State<TuitionRoutes<R>>,
    headers: HeaderMap,
    Path(student_id): Path<String>,
    Query(as_of): Query<AsOf>,
) -> Response
where
    R: TuitionRepository + 'static,
{
    let student_id = StudentId(student_id);
    let result = session(&headers)
        .and_then(|session| routes.service.statement(&session, &student_id, as_of.date()));
    respond(StatusCode::OK, result)
}

pub(crate) async fn class_status_handler<R>(
    State(routes): State<TuitionRoutes<R>>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
    Query(as_of): Query<AsOf>,
) -> Response
where
    R: TuitionRepository + 'static,
{
    let class_id = ClassId(class_id);
    let result = session(&headers)
        .and_then(|session| routes.service.class_status(&session, &class_id, as_of.date()));
    respond(StatusCode::OK, result)
}

pub(crate) async fn class_status_export_handler<R>(
    State(routes): State<TuitionRoutes<R>>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
    Query(as_of): Query<AsOf>,
) -> Response
where
    R: TuitionRepository + 'static,
{
    let class_id = ClassId(class_id);
    let status = match session(&headers)
        .and_then(|session| routes.service.class_status(&session, &class_id, as_of.date()))
    {
        Ok(status) => status,
        Err(error) => return error_response(error),
    };

    match class_status_sheet(&status.class.name, &status.students).into_attachment() {
        Ok(attachment) => attachment.into_response(),
        Err(error) => render_failure(error),
    }
}

pub(crate) async fn treasury_handler<R>(
    State(routes): State<TuitionRoutes<R>>,
    headers: HeaderMap,
    Query(range): Query<ReportRange>,
) -> Response
where
    R: TuitionRepository + 'static,
{
    let today = range.today.unwrap_or_else(|| Local::now().date_naive());
    let result = session(&headers).and_then(|session| {
        routes
            .service
            .treasury_report(&session, range.from, range.to, today)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn receipt_handler<R>(
    State(routes): State<TuitionRoutes<R>>,
    headers: HeaderMap,
    Path((student_id, payment_id)): Path<(String, String)>,
    Query(as_of): Query<AsOf>,
) -> Response
where
    R: TuitionRepository + 'static,
{
    let student_id = StudentId(student_id);
    let payment_id = PaymentId(payment_id);
    let receipt = match session(&headers).and_then(|session| {
        routes.service.receipt(
            &session,
            &student_id,
            &payment_id,
            routes.letterhead.clone(),
            as_of.date(),
        )
    }) {
        Ok(receipt) => receipt,
        Err(error) => return error_response(error),
    };

    match Attachment::render(
        routes.renderer.as_ref(),
        &receipt.file_stem(),
        &receipt_layout(&receipt),
    ) {
        Ok(attachment) => attachment.into_response(),
        Err(error) => render_failure(error),
    }
}
