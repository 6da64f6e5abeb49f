//! Endpoints consumed by the eID client rather than the relying party.

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    handlers::auth::TokenParams,
    services::flow,
    state::AppState,
};

/// Query parameters of the refresh callback. `ResultMajor`/`ResultMinor`
/// arrive spelled exactly as the eID client sends them.
#[derive(Deserialize, Debug)]
pub struct RefreshParams {
    pub token: Option<String>,
    #[serde(rename = "ResultMajor")]
    pub result_major: Option<String>,
    #[serde(rename = "ResultMinor")]
    pub result_minor: Option<String>,
}

/// Handles `GET /tctoken`.
///
/// The TC Token must go out as `text/xml` without an XML declaration; some
/// eID clients reject anything else.
#[axum::debug_handler]
pub async fn tctoken(
    State(state): State<AppState>,
    Query(params): Query<TokenParams>,
) -> Result<Response> {
    let token = params.token.ok_or(AppError::InvalidToken)?;

    let xml = flow::issue_tc_token(&state, &token).await?;
    tracing::info!("Serving TC Token for token: {}", token);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml; charset=UTF-8")],
        xml,
    )
        .into_response())
}

/// Handles `GET /refresh`.
///
/// Always answers with a 302 to the results page once the session is known;
/// this endpoint never talks to the eID-Server.
#[axum::debug_handler]
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
) -> Result<Response> {
    let token = params.token.ok_or(AppError::InvalidToken)?;

    let results_url = flow::record_client_result(
        &state,
        &token,
        params.result_major,
        params.result_minor,
    )
    .await?;

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, results_url)],
        "",
    )
        .into_response())
}
