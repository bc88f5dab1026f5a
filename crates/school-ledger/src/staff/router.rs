use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use super::domain::OnboardingRequest;
use super::repository::{PayrollLedger, StaffNotifier, StaffStoreError, UserDirectory};
use super::service::{OnboardingError, StaffOnboardingService};
use crate::session::{SchoolSession, SessionError};

pub fn staff_router<D, P, N>(service: Arc<StaffOnboardingService<D, P, N>>) -> Router
where
    D: UserDirectory + 'static,
    P: PayrollLedger + 'static,
    N: StaffNotifier + 'static,
{
    Router::new()
        .route("/api/v1/staff", post(onboard_handler::<D, P, N>))
        .with_state(service)
}

pub(crate) async fn onboard_handler<D, P, N>(
    State(service): State<Arc<StaffOnboardingService<D, P, N>>>,
    headers: HeaderMap,
    Json(request): Json<OnboardingRequest>,
) -> Response
where
    D: UserDirectory + 'static,
    P: PayrollLedger + 'static,
    N: StaffNotifier + 'static,
{
    let result = SchoolSession::from_headers(&headers)
        .map_err(OnboardingError::from)
        .and_then(|session| service.onboard(&session, request));

    match result {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(error) => {
            let status = match &error {
                OnboardingError::Session(SessionError::Forbidden { .. }) => StatusCode::FORBIDDEN,
                OnboardingError::Session(_) => StatusCode::BAD_REQUEST,
                OnboardingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                OnboardingError::Directory(StaffStoreError::DuplicateEmail(_)) => {
                    StatusCode::CONFLICT
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let payload = match &error {
                OnboardingError::Payroll { compensated, .. } => json!({
                    "error": error.to_string(),
                    "compensated": compensated,
                }),
                _ => json!({ "error": error.to_string() }),
            };
            (status, Json(payload)).into_response()
        }
    }
}
