// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! The local user record provisioned for each verified subject. API types
//! derive `Serialize`, `Deserialize`, and `ToSchema` for JSON handling and
//! OpenAPI documentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::verifier::ClaimSet;

// =============================================================================
// User Models
// =============================================================================

/// Local user record, one per trust-authority subject.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserRecord {
    /// Local identifier.
    pub id: Uuid,
    /// Subject identifier assigned by the trust authority. Unique.
    pub subject: String,
    /// Email captured when the record was provisioned. May be empty.
    pub email: String,
    /// When the record was provisioned.
    pub created_at: DateTime<Utc>,
}

/// Fields used to provision a record on first sight of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub subject: String,
    pub email: Option<String>,
}

impl NewUser {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Defaults taken from a verified claim set.
    pub fn from_claims(claims: &ClaimSet) -> Self {
        Self {
            subject: claims.subject().to_string(),
            email: claims.email.clone(),
        }
    }

    /// Build the record stored when the subject is not yet known.
    pub fn into_record(self) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            subject: self.subject,
            email: self.email.unwrap_or_default(),
            created_at: Utc::now(),
        }
    }
}
