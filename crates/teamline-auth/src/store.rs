//! Credential and configuration storage
//!
//! One JSON state file per installation holds the encrypted token bundle, the
//! selected account id (non-secret, stored in the clear), and the OAuth client
//! registration. The client secret is never written here; it is composed in
//! from the environment at read time.
//!
//! Writes go through an injectable `StateBackend` so tests can run against an
//! in-memory store. The file backend writes atomically (temp file + rename)
//! with 0600 permissions.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::CLIENT_SECRET_ENV;
use crate::crypto;
use crate::error::{Error, Result};
use crate::token::TokenResponse;

/// The decrypted credential bundle for the current session.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta).
/// Computed at storage time from `TokenResponse.expires_in` (seconds delta)
/// plus the current time.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiration as unix timestamp in milliseconds
    pub expires_at: u64,
}

impl TokenBundle {
    /// Build a bundle from a token endpoint response received at `now_millis`.
    pub fn from_response(response: &TokenResponse, now_millis: u64) -> Self {
        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_at: now_millis + response.expires_in * 1000,
        }
    }
}

/// OAuth client registration, composed from persisted config plus the
/// secret from the environment.
pub struct ClientRegistration {
    pub client_id: String,
    pub redirect_uri: String,
    pub secret: Secret<String>,
}

/// Persistence backend for the serialized state file.
///
/// `load` returns `None` when no state has been written yet.
pub trait StateBackend: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, contents: &str) -> Result<()>;
}

/// File-backed state, written atomically with owner-only permissions.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StateBackend for FileBackend {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&self.path)
            .map(Some)
            .map_err(|e| Error::Io(format!("reading state file: {e}")))
    }

    fn save(&self, contents: &str) -> Result<()> {
        write_atomic(&self.path, contents)
    }
}

/// In-memory state for tests.
#[derive(Default)]
pub struct MemoryBackend {
    cell: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>> {
        let cell = self
            .cell
            .lock()
            .map_err(|_| Error::Io("state lock poisoned".into()))?;
        Ok(cell.clone())
    }

    fn save(&self, contents: &str) -> Result<()> {
        let mut cell = self
            .cell
            .lock()
            .map_err(|_| Error::Io("state lock poisoned".into()))?;
        *cell = Some(contents.to_string());
        Ok(())
    }
}

impl<B: StateBackend> StateBackend for std::sync::Arc<B> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, contents: &str) -> Result<()> {
        (**self).save(contents)
    }
}

/// On-disk shape of the state file. Token fields hold the serialized
/// `hex(iv):hex(ciphertext)` form, or legacy plaintext from older releases.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client: Option<StoredClient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    account_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tokens: Option<StoredTokens>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredClient {
    client_id: String,
    redirect_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTokens {
    access: String,
    refresh: String,
    expires_at: u64,
}

/// Store for the credential bundle, account selection, and client
/// registration. Secrets are encrypted under the machine-bound key before
/// they reach the backend.
pub struct CredentialStore {
    backend: Box<dyn StateBackend>,
    key: [u8; 32],
}

impl CredentialStore {
    /// Open a file-backed store at the given path.
    pub fn open(path: &Path) -> Self {
        Self::with_backend(Box::new(FileBackend::new(path.to_path_buf())))
    }

    /// Open a store over an arbitrary backend (in-memory for tests).
    pub fn with_backend(backend: Box<dyn StateBackend>) -> Self {
        Self {
            backend,
            key: crypto::derive_key(),
        }
    }

    fn read_state(&self) -> Result<StateFile> {
        let Some(raw) = self.backend.load()? else {
            return Ok(StateFile::default());
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                // A mangled state file means "no session", not a crash
                warn!(error = %e, "state file unreadable, starting fresh");
                Ok(StateFile::default())
            }
        }
    }

    fn write_state(&self, state: &StateFile) -> Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| Error::Json(format!("serializing state: {e}")))?;
        self.backend.save(&json)
    }

    /// Replace the credential bundle wholesale, encrypting both tokens.
    pub fn set_tokens(&self, bundle: &TokenBundle) -> Result<()> {
        let mut state = self.read_state()?;
        state.tokens = Some(StoredTokens {
            access: crypto::encrypt(&self.key, &bundle.access_token)?,
            refresh: crypto::encrypt(&self.key, &bundle.refresh_token)?,
            expires_at: bundle.expires_at,
        });
        self.write_state(&state)?;
        debug!(expires_at = bundle.expires_at, "stored token bundle");
        Ok(())
    }

    /// Read and decrypt the credential bundle.
    ///
    /// Returns `None` when no bundle is stored or when the stored material
    /// cannot be decrypted (copied from another machine, truncated file).
    /// Legacy plaintext tokens are returned as-is.
    pub fn get_tokens(&self) -> Result<Option<TokenBundle>> {
        let state = self.read_state()?;
        let Some(stored) = state.tokens else {
            return Ok(None);
        };

        match (
            self.read_token_field(&stored.access),
            self.read_token_field(&stored.refresh),
        ) {
            (Ok(access_token), Ok(refresh_token)) => Ok(Some(TokenBundle {
                access_token,
                refresh_token,
                expires_at: stored.expires_at,
            })),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "stored tokens unreadable, treating as logged out");
                Ok(None)
            }
        }
    }

    fn read_token_field(&self, stored: &str) -> Result<String> {
        if crypto::is_encoded(stored) {
            crypto::decrypt(&self.key, stored)
        } else {
            // Plaintext token from a release before at-rest encryption
            Ok(stored.to_string())
        }
    }

    /// Destroy the credential bundle (logout).
    pub fn clear_tokens(&self) -> Result<()> {
        let mut state = self.read_state()?;
        if state.tokens.take().is_some() {
            self.write_state(&state)?;
            debug!("cleared token bundle");
        }
        Ok(())
    }

    /// Persist the selected account id. Stored in the clear: the id is not
    /// a secret, and resource operations need it before decryption.
    pub fn set_account(&self, account_id: u64) -> Result<()> {
        let mut state = self.read_state()?;
        state.account_id = Some(account_id);
        self.write_state(&state)?;
        debug!(account_id, "selected account");
        Ok(())
    }

    /// The selected account id, if any.
    pub fn account(&self) -> Result<Option<u64>> {
        Ok(self.read_state()?.account_id)
    }

    /// Persist the OAuth client id and redirect URI (one-time configuration).
    pub fn set_client_registration(&self, client_id: &str, redirect_uri: &str) -> Result<()> {
        let mut state = self.read_state()?;
        state.client = Some(StoredClient {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
        });
        self.write_state(&state)
    }

    /// Compose the full client registration: persisted id + redirect URI,
    /// secret from the environment. The secret never touches disk.
    pub fn client_registration(&self) -> Result<ClientRegistration> {
        let state = self.read_state()?;
        let Some(client) = state.client else {
            return Err(Error::NotConfigured(
                "no client id / redirect URI stored; run configuration first".into(),
            ));
        };
        let secret = std::env::var(CLIENT_SECRET_ENV).map_err(|_| {
            Error::MissingSecret(format!("{CLIENT_SECRET_ENV} environment variable is not set"))
        })?;
        Ok(ClientRegistration {
            client_id: client.client_id,
            redirect_uri: client.redirect_uri,
            secret: Secret::new(secret),
        })
    }
}

/// Write the state file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write never leaves a truncated state file.
/// Permissions are 0600 since the file contains (encrypted) OAuth tokens.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("state path has no parent directory".into()))?;
    std::fs::create_dir_all(dir).map_err(|e| Error::Io(format!("creating state dir: {e}")))?;

    let tmp_path = dir.join(format!(".state.tmp.{}", std::process::id()));
    std::fs::write(&tmp_path, contents.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp state file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| Error::Io(format!("setting state file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp state file: {e}")))?;
    Ok(())
}
