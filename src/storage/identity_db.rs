// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded identity database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: subject → serialized UserRecord (JSON)
//!
//! The subject is the table key, which is the uniqueness constraint.
//! Get-or-create runs inside a single write transaction; redb serializes
//! writers, so a second provisioning attempt sees the first one's record.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use super::{IdentityStore, StoreError};
use crate::models::{NewUser, UserRecord};

/// Primary table: subject → serialized UserRecord (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

#[derive(Debug, thiserror::Error)]
pub enum IdentityDbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IdentityDbResult<T> = Result<T, IdentityDbError>;

/// Embedded ACID identity database.
pub struct IdentityDatabase {
    db: Database,
}

impl IdentityDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> IdentityDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Identity database opened");
        Ok(Self { db })
    }

    /// Insert the user if its subject is absent, otherwise return the stored record.
    pub fn get_or_insert(&self, user: NewUser) -> IdentityDbResult<UserRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut table = write_txn.open_table(USERS)?;
            let existing = match table.get(user.subject.as_str())? {
                Some(value) => Some(serde_json::from_slice::<UserRecord>(value.value())?),
                None => None,
            };

            match existing {
                Some(record) => record,
                None => {
                    let record = user.into_record();
                    let json = serde_json::to_vec(&record)?;
                    table.insert(record.subject.as_str(), json.as_slice())?;
                    tracing::info!(user_id = %record.id, "Provisioned user for new subject");
                    record
                }
            }
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Look up a record by subject.
    #[cfg(test)]
    pub fn find(&self, subject: &str) -> IdentityDbResult<Option<UserRecord>> {
        use redb::ReadableDatabase;

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(subject)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Number of provisioned users.
    #[cfg(test)]
    pub fn count(&self) -> IdentityDbResult<u64> {
        use redb::{ReadableDatabase, ReadableTableMetadata};

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        Ok(table.len()?)
    }
}

impl IdentityStore for IdentityDatabase {
    fn get_or_create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        Ok(self.get_or_insert(user)?)
    }
}
