//! Process-wide session state.
//!
//! One explicit object replaces ambient browser storage: it begins on a
//! successful login/register, ends on logout or on any 401/403, and is
//! handed to the API client rather than read from globals.

use crate::model::User;
use crate::persist::{CredentialFile, SaveFileError, StoredCredentials};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Shared handle. Clones see the same state.
#[derive(Clone, Default)]
pub struct Session {
    state: Arc<RwLock<Option<StoredCredentials>>>,
    file: Option<CredentialFile>,
}

impl Session {
    /// A session that lives only in memory.
    pub fn in_memory() -> Self {
        Session::default()
    }

    /// A session backed by a credential file. Picks up cached credentials
    /// from a previous run, if any.
    pub fn restore(file: CredentialFile) -> Result<Self, SaveFileError> {
        let cached = file.load()?;
        if let Some(creds) = &cached {
            debug!(user = %creds.user.username, "restored cached session");
        }
        Ok(Session {
            state: Arc::new(RwLock::new(cached)),
            file: Some(file),
        })
    }

    /// Install fresh credentials.
    pub fn begin(&self, token: String, user: User) {
        let creds = StoredCredentials { token, user };
        if let Some(file) = &self.file {
            if let Err(e) = file.save(&creds) {
                warn!("could not cache credentials: {e}");
            }
        }
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(creds);
    }

    /// Drop credentials, in memory and on disk.
    pub fn end(&self) {
        let had = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if let Some(file) = &self.file {
            if let Err(e) = file.clear() {
                warn!("could not clear cached credentials: {e}");
            }
        }
        if had {
            debug!("session ended");
        }
    }

    pub fn token(&self) -> Option<String> {
        self.read(|c| c.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.read(|c| c.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(|_| ()).is_some()
    }

    fn read<T>(&self, f: impl FnOnce(&StoredCredentials) -> T) -> Option<T> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }
}

// ── Tests ──────────────────────────────────────────────────────
