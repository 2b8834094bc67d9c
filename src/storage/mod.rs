// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Storage Module
//!
//! Local user records, keyed by the trust authority's subject identifier.
//!
//! ## Provisioning Model
//!
//! A subject is provisioned on its first verified request. Provisioning is an
//! atomic "insert if absent, else fetch" at the storage boundary, so
//! concurrent first requests for the same subject produce exactly one record.
//!
//! ## Backends
//!
//! - [`IdentityDatabase`]: embedded redb file, used when `DATA_DIR` is set
//! - [`InMemoryIdentityStore`](crate::store::InMemoryIdentityStore): process
//!   memory, used otherwise and in tests

pub mod identity_db;

pub use identity_db::{IdentityDatabase, IdentityDbError};

use crate::models::{NewUser, UserRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] IdentityDbError),

    #[error("identity store lock poisoned")]
    Poisoned,
}

/// Persistence boundary for local user records.
pub trait IdentityStore: Send + Sync {
    /// Return the record for `user.subject`, creating it if absent.
    ///
    /// Must be atomic: concurrent calls for one subject yield the same record.
    fn get_or_create(&self, user: NewUser) -> Result<UserRecord, StoreError>;
}
