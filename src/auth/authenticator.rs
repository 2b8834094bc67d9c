// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request authentication.
//!
//! Turns request headers into one of three outcomes:
//!
//! - [`AuthOutcome::Authenticated`]: verified token, local user provisioned
//! - [`AuthOutcome::NoCredential`]: no credential, the request is anonymous
//! - [`AuthOutcome::Rejected`]: a credential was presented and refused
//!
//! Whether anonymous requests are allowed is decided by the route, not here.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::error::RejectReason;
use super::verifier::{ClaimSet, TokenVerifier};
use crate::models::{NewUser, UserRecord};
use crate::storage::IdentityStore;

/// A verified caller.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: UserRecord,
    pub claims: ClaimSet,
}

impl Identity {
    pub fn subject(&self) -> &str {
        &self.user.subject
    }
}

#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated(Identity),
    NoCredential,
    Rejected(RejectReason),
}

/// Bearer credential in a request, before verification.
#[derive(Debug, PartialEq, Eq)]
enum Credential<'a> {
    Absent,
    Bearer(&'a str),
    Malformed,
}

/// Read the `Authorization` header.
///
/// A missing or blank header is no credential. Anything else must be exactly
/// two whitespace-separated parts with a case-insensitive `Bearer` keyword.
fn bearer_token(headers: &HeaderMap) -> Credential<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Credential::Absent;
    };
    let Ok(value) = value.to_str() else {
        return Credential::Malformed;
    };

    let parts: Vec<&str> = value.split_whitespace().collect();
    match parts.as_slice() {
        [] => Credential::Absent,
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => Credential::Bearer(*token),
        _ => Credential::Malformed,
    }
}

/// Authenticates requests and provisions local identities.
pub struct Authenticator {
    verifier: TokenVerifier,
    identities: Arc<dyn IdentityStore>,
}

impl Authenticator {
    pub fn new(verifier: TokenVerifier, identities: Arc<dyn IdentityStore>) -> Self {
        Self {
            verifier,
            identities,
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        let token = match bearer_token(headers) {
            Credential::Absent => return AuthOutcome::NoCredential,
            Credential::Malformed => {
                tracing::debug!("Rejected malformed authorization header");
                return AuthOutcome::Rejected(RejectReason::MalformedHeader);
            }
            Credential::Bearer(token) => token,
        };

        let claims = match self.verifier.verify(token).await {
            Ok(claims) => claims,
            Err(e) => {
                let reason = RejectReason::from(e);
                tracing::warn!(reason = %reason.code(), "Bearer token rejected");
                return AuthOutcome::Rejected(reason);
            }
        };

        match self.identities.get_or_create(NewUser::from_claims(&claims)) {
            Ok(user) => AuthOutcome::Authenticated(Identity { user, claims }),
            Err(e) => {
                tracing::error!(error = %e, "Failed to provision user for verified subject");
                AuthOutcome::Rejected(RejectReason::IdentityUnavailable)
            }
        }
    }
}
