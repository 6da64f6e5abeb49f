use crate::config::Config;
use crate::error::Result;
use crate::repositories::session::SessionStore;
use crate::soap::client::SoapClient;

/// The application's state.
///
/// The store is the only shared mutable resource; the SOAP client is
/// stateless and shared freely. Handlers receive this by injection rather
/// than through any ambient global.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// The durable session store.
    pub sessions: SessionStore,
    /// The SOAP client for the eID-Server.
    pub soap: SoapClient,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let sessions = SessionStore::open(config.session_dir.clone()).await?;
        tracing::info!("Session store initialized at {:?}", config.session_dir);

        let soap = SoapClient::new(config)?;
        tracing::info!("SOAP client initialized for {}", config.eid_server_url);

        Ok(AppState {
            config: config.clone(),
            sessions,
            soap,
        })
    }
}
