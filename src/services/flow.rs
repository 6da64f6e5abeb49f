//! The authentication flow orchestrator.
//!
//! Sequences the session store, SOAP client and TC Token emitter across the
//! four HTTP entry points. All cross-request state lives in the store; every
//! function here is a pure request-scoped sequence over it.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    error::{AppError, Result},
    models::eid::{
        GetResultResponse, PersonalData, ProtocolResult, TransactionAttestationResponse,
        VerificationResult,
    },
    models::session::AuthenticationConfig,
    state::AppState,
    tctoken,
};

/// Each session performs exactly one result retrieval in this deployment,
/// so the counter never advances.
const GET_RESULT_REQUEST_COUNTER: u32 = 1;

/// The outcome of a successful start request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedAuthentication {
    pub tc_token_url: String,
    /// Included for relying-party debugging; the tcTokenUrl already carries it.
    pub token: String,
}

/// The relying-party-facing view of a finished (or failed) authentication.
/// The PSK never appears here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResult {
    pub success: bool,
    pub result: ProtocolResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_data: Option<PersonalData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_verification: Option<VerificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_verification: Option<VerificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations_allowed: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_attestation: Option<TransactionAttestationResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_of_assurance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eid_type: Option<BTreeMap<String, String>>,
    pub config: AuthenticationConfig,
}

/// Creates a configuration session and hands back the TC Token URL the
/// relying party forwards to the eID client.
pub async fn start_authentication(
    state: &AppState,
    config: AuthenticationConfig,
) -> Result<StartedAuthentication> {
    let token = state.sessions.create(config).await?;
    let tc_token_url = format!("{}/tctoken?token={}", state.config.public_base_url, token);

    Ok(StartedAuthentication { tc_token_url, token })
}

/// Serves the TC Token for a session, performing the useID call on first
/// fetch.
///
/// A re-fetch of an already-active session re-emits the token from stored
/// state without touching the eID-Server, so eID-client retries are
/// harmless. A server-reported non-ok useID result aborts the promotion and
/// leaves the session configured for another attempt.
pub async fn issue_tc_token(state: &AppState, token: &str) -> Result<String> {
    let session = state.sessions.get(token).await?;

    if session.is_active() {
        tracing::debug!("Session already has useID data for token: {}", token);
        return tctoken::render_tc_token(&session, &state.config, token);
    }

    tracing::info!("Configuration session found, calling useID for token: {}", token);
    let outcome = state.soap.call_use_id(&session.config).await?;

    if !outcome.result.is_ok() {
        // Session stays configured; the eID client may retry the fetch.
        return Err(AppError::UpstreamProtocol(outcome.result.result_major));
    }

    let issued = outcome.session.ok_or_else(|| {
        AppError::UpstreamTransport("useID response is missing Session or PSK material".to_string())
    })?;
    state
        .sessions
        .attach_server_identifiers(token, &issued)
        .await?;

    let session = state.sessions.get(token).await?;
    tctoken::render_tc_token(&session, &state.config, token)
}

/// Records the result the eID client reported at the refresh callback and
/// returns the results-page URL to redirect to.
///
/// Persistence is best effort: the redirect happens even if the write
/// fails, since the browser is mid-navigation. An unknown token is still a
/// hard 404.
pub async fn record_client_result(
    state: &AppState,
    token: &str,
    result_major: Option<String>,
    result_minor: Option<String>,
) -> Result<String> {
    let session = state.sessions.get(token).await?;
    tracing::info!(
        "eID client callback for session {} (ResultMajor: {:?})",
        session.server_session_id,
        result_major
    );

    if let Err(e) = state
        .sessions
        .attach_client_result(token, result_major, result_minor)
        .await
    {
        tracing::warn!("Failed to persist client result for token {}: {}", token, e);
    }

    Ok(format!(
        "{}/results?token={}",
        state.config.public_base_url, token
    ))
}

/// Retrieves the structured authentication result.
///
/// A client-reported error short-circuits without calling getResult; the
/// relying party sees the client's result code instead of a protocol error
/// from the eID-Server.
pub async fn fetch_result(state: &AppState, token: &str) -> Result<AuthenticationResult> {
    let session = state.sessions.get(token).await?;

    if let Some(major) = session.client_result_major.as_deref() {
        if major.contains("error") {
            tracing::info!("eID client reported an error, skipping getResult");
            return Ok(AuthenticationResult {
                success: false,
                result: ProtocolResult {
                    result_major: major.to_string(),
                    result_minor: session.client_result_minor.clone(),
                    result_message: Some(
                        "eID-Client reported an error during the authentication process."
                            .to_string(),
                    ),
                },
                personal_data: None,
                age_verification: None,
                place_verification: None,
                operations_allowed: None,
                transaction_attestation: None,
                level_of_assurance: None,
                eid_type: None,
                config: session.config,
            });
        }
    }

    if !session.is_active() {
        // getResult needs the server session id from useID; a result fetch
        // before activation cannot succeed.
        return Err(AppError::Internal(
            "Result requested before the eID session was established".to_string(),
        ));
    }

    tracing::info!("Calling getResult for session: {}", session.server_session_id);
    let response = state
        .soap
        .call_get_result(&session.server_session_id, GET_RESULT_REQUEST_COUNTER)
        .await?;

    Ok(assemble_result(response, session.config))
}

fn assemble_result(
    response: GetResultResponse,
    config: AuthenticationConfig,
) -> AuthenticationResult {
    AuthenticationResult {
        success: response.result.is_ok(),
        result: response.result,
        personal_data: response.personal_data,
        age_verification: response.fulfils_age_verification,
        place_verification: response.fulfils_place_verification,
        operations_allowed: response.operations_allowed_by_user,
        transaction_attestation: response.transaction_attestation_response,
        level_of_assurance: response.level_of_assurance_result,
        eid_type: response.eid_type_response,
        config,
    }
}
