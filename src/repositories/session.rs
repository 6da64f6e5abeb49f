use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::eid::UseIdSession,
    models::session::{AuthenticationConfig, Session},
    validation::token::validate_token,
};

/// Sessions older than this read as not-found and are reclaimed by the sweep.
pub const SESSION_TTL_SECS: i64 = 30 * 60;

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Durable session storage: one JSON file per token.
///
/// Sessions are independent, so no cross-key locking exists; each operation
/// is a whole-record read or write on a single file. A `get` racing a
/// sweep-triggered delete observes not-found, nothing worse.
#[derive(Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Opens the store, creating the session directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Resolves a token to its file path. The strict format check runs first,
    /// so no unvalidated token ever reaches path resolution.
    fn session_path(&self, token: &str) -> Result<PathBuf> {
        validate_token(token)?;
        Ok(self.dir.join(format!("{}.json", token)))
    }

    /// Creates a configuration-only session and returns its fresh token.
    pub async fn create(&self, config: AuthenticationConfig) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let path = self.session_path(&token)?;

        // 128-bit random tokens do not collide in practice; verify anyway
        // rather than silently overwriting a live session.
        if fs::try_exists(&path).await? {
            return Err(AppError::Storage(format!(
                "token collision for token: {}",
                token
            )));
        }

        self.write(&path, &Session::new(config)).await?;
        tracing::info!("Created configuration session for token: {}", token);
        Ok(token)
    }

    /// Returns the session for `token`, treating expired and corrupt records
    /// as not-found (both are deleted on sight).
    pub async fn get(&self, token: &str) -> Result<Session> {
        let path = self.session_path(token)?;

        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::SessionNotFound);
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let session: Session = match sonic_rs::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                // Corrupt record: deleting it lets the flow restart from
                // /auth/start instead of failing forever.
                tracing::warn!("Corrupt session record for token {}: {}", token, e);
                self.delete(token).await?;
                return Err(AppError::SessionNotFound);
            }
        };

        if Self::is_expired(&session) {
            tracing::debug!("Session expired for token: {}", token);
            self.delete(token).await?;
            return Err(AppError::SessionNotFound);
        }

        Ok(session)
    }

    /// Read-modify-write primitive. All session mutations go through here.
    async fn update<F>(&self, token: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Session),
    {
        let mut session = self.get(token).await?;
        mutate(&mut session);
        let path = self.session_path(token)?;
        self.write(&path, &session).await
    }

    /// Attaches the identifiers issued by a successful useID call, promoting
    /// the session from configured to active.
    pub async fn attach_server_identifiers(
        &self,
        token: &str,
        issued: &UseIdSession,
    ) -> Result<()> {
        self.update(token, |session| {
            session.server_session_id = issued.session_id.clone();
            session.psk_id = issued.psk_id.clone();
            session.psk_key = issued.psk_key.clone();
            session.ecard_server_address = issued.ecard_server_address.clone();
        })
        .await?;
        tracing::info!("Attached useID identifiers for token: {}", token);
        Ok(())
    }

    /// Records the result the eID client reported at the refresh callback.
    pub async fn attach_client_result(
        &self,
        token: &str,
        result_major: Option<String>,
        result_minor: Option<String>,
    ) -> Result<()> {
        self.update(token, |session| {
            session.client_result_major = result_major;
            session.client_result_minor = result_minor;
        })
        .await?;
        tracing::info!("Attached client result for token: {}", token);
        Ok(())
    }

    /// Removes a session. Deleting a missing session is a no-op success.
    pub async fn delete(&self, token: &str) -> Result<()> {
        let path = self.session_path(token)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted session file for token: {}", token);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Removes every expired or undeserializable record. Returns the number
    /// of files reclaimed.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let mut reclaimed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let remove = match fs::read_to_string(&path).await {
                Ok(raw) => match sonic_rs::from_str::<Session>(&raw) {
                    Ok(session) => Self::is_expired(&session),
                    Err(e) => {
                        tracing::warn!("Sweeping corrupt session file {:?}: {}", path, e);
                        true
                    }
                },
                // Deleted by a concurrent request between read_dir and read.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => return Err(AppError::Io(e)),
            };

            if remove {
                match fs::remove_file(&path).await {
                    Ok(()) => reclaimed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(AppError::Io(e)),
                }
            }
        }

        if reclaimed > 0 {
            tracing::info!("Cleaned up {} expired sessions", reclaimed);
        }
        Ok(reclaimed)
    }

    /// Starts the periodic sweep and hands back its lifecycle handle.
    pub fn start_sweeper(&self) -> SweeperHandle {
        let store = self.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                if let Err(e) = store.sweep_expired().await {
                    tracing::error!("Session sweep failed: {}", e);
                }
            }
        });
        SweeperHandle { task }
    }

    fn is_expired(session: &Session) -> bool {
        (Utc::now() - session.created_at).num_seconds() > SESSION_TTL_SECS
    }

    async fn write(&self, path: &PathBuf, session: &Session) -> Result<()> {
        let json = sonic_rs::to_string(session)
            .map_err(|e| AppError::Storage(format!("Session serialization failed: {}", e)))?;
        fs::write(path, json).await?;
        Ok(())
    }
}

/// Owns the background sweep task.
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweep. In-flight file operations complete on their own;
    /// request handling is never blocked by the sweep either way.
    pub fn stop(self) {
        self.task.abort();
    }
}
