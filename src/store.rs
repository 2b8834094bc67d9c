// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory identity store.
//!
//! Used when no `DATA_DIR` is configured, and by tests. Records do not
//! survive a restart.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{NewUser, UserRecord};
use crate::storage::{IdentityStore, StoreError};

#[derive(Default)]
pub struct InMemoryIdentityStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.lock().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn get_or_create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        let record = users
            .entry(user.subject.clone())
            .or_insert_with(|| {
                let record = user.into_record();
                tracing::info!(user_id = %record.id, "Provisioned user for new subject");
                record
            })
            .clone();
        Ok(record)
    }
}
