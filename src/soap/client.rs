use std::time::Duration;
use zeroize::Zeroizing;

use crate::{
    config::{Config, TlsMode},
    error::{AppError, Result},
    models::eid::{GetResultResponse, UseIdOutcome},
    models::session::AuthenticationConfig,
    soap::envelope::{build_get_result_request, build_use_id_request},
    soap::response::{parse_get_result_response, parse_use_id_response},
};

/// Fixed per-request timeout for eID-Server calls.
const SOAP_TIMEOUT: Duration = Duration::from_secs(30);

/// SOAP client for the eID-Server.
///
/// Holds no session-scoped state; one instance is shared across all
/// in-flight requests. The transport is fixed at construction: plain TLS, or
/// mutual TLS when the configuration carries a client certificate, with
/// self-signed server certificates accepted outside production.
#[derive(Clone)]
pub struct SoapClient {
    http: reqwest::Client,
    endpoint: String,
}

impl SoapClient {
    /// Creates a new `SoapClient` from the application configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(SOAP_TIMEOUT)
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(ca) = &config.ca_bundle {
            let ca = reqwest::Certificate::from_pem(ca).map_err(|e| {
                AppError::Internal(format!("Invalid eID-Server CA certificate: {}", e))
            })?;
            builder = builder.add_root_certificate(ca);
            tracing::info!("Added CA certificate for eID-Server validation");
        }

        if config.tls_mode == TlsMode::Mutual {
            let (cert, key) = match (&config.client_cert, &config.client_key) {
                (Some(cert), Some(key)) => (cert, key),
                _ => {
                    return Err(AppError::Internal(
                        "mTLS mode requested but certificates not provided".to_string(),
                    ));
                }
            };

            // rustls wants certificate chain and key in one PEM bundle.
            let mut bundle = Zeroizing::new(Vec::with_capacity(cert.len() + key.len() + 1));
            bundle.extend_from_slice(cert);
            bundle.push(b'\n');
            bundle.extend_from_slice(key);

            let identity = reqwest::Identity::from_pem(&bundle).map_err(|e| {
                AppError::Internal(format!("Invalid mTLS client certificate/key: {}", e))
            })?;
            builder = builder.identity(identity);
            tracing::info!("Configured mutual TLS for eID-Server communication");
        } else {
            tracing::info!("Using normal TLS for eID-Server communication");
        }

        if config.accept_invalid_certs {
            tracing::warn!("Accepting self-signed eID-Server certificates (non-production mode)");
        }

        let http = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build SOAP transport: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.eid_server_url.clone(),
        })
    }

    /// Starts a server-side eID session.
    ///
    /// Fails hard on transport problems or a structurally invalid response.
    /// A server-reported non-ok result is returned to the caller untouched;
    /// interpreting it is the orchestrator's job.
    pub async fn call_use_id(&self, config: &AuthenticationConfig) -> Result<UseIdOutcome> {
        let envelope = build_use_id_request(config)?;
        tracing::debug!("Sending useID request to {}", self.endpoint);

        let body = self.post(envelope, "useID").await?;
        let outcome = parse_use_id_response(&body)?;

        if outcome.result.is_ok() && outcome.session.is_none() {
            return Err(AppError::UpstreamTransport(
                "useID response is missing Session or PSK material".to_string(),
            ));
        }

        tracing::debug!("Parsed useID response: {:?}", outcome);
        Ok(outcome)
    }

    /// Retrieves the verified attributes for a completed authentication.
    pub async fn call_get_result(
        &self,
        session_id: &str,
        request_counter: u32,
    ) -> Result<GetResultResponse> {
        let envelope = build_get_result_request(session_id, request_counter)?;
        tracing::debug!(
            "Sending getResult request for session {} to {}",
            session_id,
            self.endpoint
        );

        let body = self.post(envelope, "getResult").await?;
        parse_get_result_response(&body)
    }

    /// Posts one SOAP envelope. No retries: transport errors, timeouts and
    /// non-2xx statuses fail the operation and are surfaced as-is.
    async fn post(&self, envelope: String, operation: &'static str) -> Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml;charset=UTF-8")
            .header("SOAPAction", "")
            .body(envelope)
            .send()
            .await
            .map_err(|e| {
                AppError::UpstreamTransport(format!("{} request failed: {}", operation, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamTransport(format!(
                "{} returned HTTP {}",
                operation, status
            )));
        }

        response.text().await.map_err(|e| {
            AppError::UpstreamTransport(format!("{} response unreadable: {}", operation, e))
        })
    }
}
