use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::session::{
        AgeVerificationRequest, AuthenticationConfig, EidTypeRequest, OperationsRequest,
        PlaceVerificationRequest, TransactionAttestationRequest, TransactionInfo,
    },
    services::flow,
    state::AppState,
};

/// The request payload for starting an authentication.
///
/// Mirrors `AuthenticationConfig` but keeps `operations` optional so a
/// payload without one is answered with a 400 instead of a rejection from
/// the extractor.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub operations: Option<OperationsRequest>,
    #[serde(default)]
    pub age_verification: Option<AgeVerificationRequest>,
    #[serde(default)]
    pub place_verification: Option<PlaceVerificationRequest>,
    #[serde(default)]
    pub transaction_attestation: Option<TransactionAttestationRequest>,
    #[serde(default)]
    pub transaction_info: Option<TransactionInfo>,
    #[serde(default)]
    pub level_of_assurance: Option<String>,
    #[serde(default)]
    pub eid_type_request: EidTypeRequest,
}

/// Query parameters carrying only the session token.
#[derive(Deserialize, Debug)]
pub struct TokenParams {
    pub token: Option<String>,
}

/// Handles `POST /auth/start`.
#[axum::debug_handler]
pub async fn start(
    State(state): State<AppState>,
    Json(payload): Json<StartRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!("Start authentication request: {:?}", payload);

    let operations = payload
        .operations
        .ok_or_else(|| AppError::InvalidConfiguration("missing operations".to_string()))?;

    let config = AuthenticationConfig {
        operations,
        age_verification: payload.age_verification,
        place_verification: payload.place_verification,
        transaction_attestation: payload.transaction_attestation,
        transaction_info: payload.transaction_info,
        level_of_assurance: payload.level_of_assurance,
        eid_type_request: payload.eid_type_request,
    };

    let started = flow::start_authentication(&state, config).await?;
    tracing::info!("Authentication started for token: {}", started.token);

    Ok((StatusCode::OK, Json(started)))
}

/// Handles `GET /result`.
#[axum::debug_handler]
pub async fn result(
    State(state): State<AppState>,
    Query(params): Query<TokenParams>,
) -> Result<impl IntoResponse> {
    let token = params.token.ok_or(AppError::InvalidToken)?;

    let result = flow::fetch_result(&state, &token).await?;
    tracing::info!(
        "Returning authentication result for token {} (success: {})",
        token,
        result.success
    );

    Ok((StatusCode::OK, Json(result)))
}
