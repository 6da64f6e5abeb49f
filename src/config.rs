use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// The TLS mode used when talking to the eID-Server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsMode {
    /// Server authentication only.
    Normal,
    /// Mutual TLS with a client certificate.
    Mutual,
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The SOAP endpoint of the eID-Server.
    pub eid_server_url: String,
    /// The default eCard server address embedded in TC Tokens when the
    /// useID response does not supply one.
    pub eid_server_address: String,
    /// The public base URL of this service. TC Token, refresh and results
    /// URLs handed to the eID client are derived from it.
    pub public_base_url: String,
    /// The TLS mode for eID-Server communication.
    pub tls_mode: TlsMode,
    /// Client certificate PEM for mutual TLS.
    pub client_cert: Option<Zeroizing<Vec<u8>>>,
    /// Client private key PEM for mutual TLS.
    pub client_key: Option<Zeroizing<Vec<u8>>>,
    /// CA bundle PEM used to validate the eID-Server certificate.
    pub ca_bundle: Option<Zeroizing<Vec<u8>>>,
    /// Whether self-signed eID-Server certificates are accepted. Always
    /// false in production.
    pub accept_invalid_certs: bool,
    /// The directory holding one session file per token.
    pub session_dir: PathBuf,
    /// The port the HTTP server binds to.
    pub port: u16,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let is_production = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            == "production";

        let tls_mode = match env::var("EID_SERVER_TLS_MODE")
            .unwrap_or_else(|_| "normal".to_string())
            .as_str()
        {
            "mtls" => TlsMode::Mutual,
            _ => TlsMode::Normal,
        };

        let client_cert = load_pem("EID_SERVER_CERT", "EID_SERVER_CERT_PATH")?;
        let client_key = load_pem("EID_SERVER_KEY", "EID_SERVER_KEY_PATH")?;
        let ca_bundle = load_pem("EID_SERVER_CA", "EID_SERVER_CA_PATH")?;

        if tls_mode == TlsMode::Mutual && (client_cert.is_none() || client_key.is_none()) {
            anyhow::bail!(
                "EID_SERVER_TLS_MODE=mtls requires a client certificate and key \
                 (EID_SERVER_CERT[_PATH] and EID_SERVER_KEY[_PATH])"
            );
        }

        Ok(Self {
            eid_server_url: env::var("EID_SERVER_URL")
                .unwrap_or_else(|_| "https://localhost:8443/eIDService".to_string()),
            eid_server_address: env::var("EID_SERVER_ADDRESS")
                .unwrap_or_else(|_| "https://localhost:8443/eIDService".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "https://localhost:8443".to_string()),
            tls_mode,
            client_cert,
            client_key,
            ca_bundle,
            accept_invalid_certs: !is_production,
            session_dir: env::var("SESSION_DIR")
                .unwrap_or_else(|_| ".sessions".to_string())
                .into(),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Invalid PORT")?,
        })
    }
}

/// Loads PEM material from either an inline environment variable or a file
/// path variable. Inline content takes precedence when both are set.
fn load_pem(inline_var: &str, path_var: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
    if let Ok(inline) = env::var(inline_var) {
        if !inline.trim().is_empty() {
            return Ok(Some(Zeroizing::new(inline.into_bytes())));
        }
    }

    if let Ok(path) = env::var(path_var) {
        if !path.trim().is_empty() {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {} from {}", inline_var, path))?;
            return Ok(Some(Zeroizing::new(bytes)));
        }
    }

    Ok(None)
}
