//! Credential cache on disk.
//!
//! A small redb file holding one postcard-encoded record: the bearer token
//! and the signed-in user's profile. Written when a session begins, cleared
//! when it ends.

use crate::model::User;
use redb::{Database, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const SESSION: TableDefinition<&str, &[u8]> = TableDefinition::new("session");
const CREDENTIALS_KEY: &str = "credentials";

/// What a signed-in session needs to survive a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub token: String,
    pub user: User,
}

/// Thin handle to the redb file. Cloneable (Arc inside).
#[derive(Clone)]
pub struct CredentialFile {
    db: Arc<Database>,
}

impl CredentialFile {
    /// Open (or create) the credential file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SaveFileError> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(SESSION)?;
        }
        txn.commit()?;

        Ok(CredentialFile { db: Arc::new(db) })
    }

    pub fn load(&self) -> Result<Option<StoredCredentials>, SaveFileError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SESSION)?;
        let Some(value) = table.get(CREDENTIALS_KEY)? else {
            return Ok(None);
        };
        let creds = postcard::from_bytes(value.value())
            .map_err(|e| SaveFileError::Decode(e.to_string()))?;
        Ok(Some(creds))
    }

    pub fn save(&self, creds: &StoredCredentials) -> Result<(), SaveFileError> {
        let bytes = postcard::to_allocvec(creds)
            .map_err(|e| SaveFileError::Encode(e.to_string()))?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SESSION)?;
            table.insert(CREDENTIALS_KEY, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SaveFileError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SESSION)?;
            table.remove(CREDENTIALS_KEY)?;
        }
        txn.commit()?;
        Ok(())
    }
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SaveFileError {
    #[error("redb: {0}")]
    Redb(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("encode: {0}")]
    Encode(String),
}

// redb 2.x has many error types. Blanket them all into SaveFileError::Redb.
macro_rules! from_redb {
    ($($t:ty),*) => {
        $(impl From<$t> for SaveFileError {
            fn from(e: $t) -> Self { SaveFileError::Redb(e.to_string()) }
        })*
    };
}

from_redb!(
    redb::Error,
    redb::DatabaseError,
    redb::TableError,
    redb::TransactionError,
    redb::StorageError,
    redb::CommitError
);

// ── Tests ──────────────────────────────────────────────────────
