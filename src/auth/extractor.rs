// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated callers.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity.user is the local record, identity.claims the verified token
//! }
//! ```
//!
//! Both extractors reuse the middleware's decision when it ran and
//! authenticate the request themselves otherwise.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::authenticator::{AuthOutcome, Identity};
use super::middleware::{from_extensions, Authenticated};
use super::AuthError;
use crate::state::AppState;

/// Extractor for authenticated callers.
///
/// Rejects anonymous requests with `missing_auth_header`.
pub struct Auth(pub Identity);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match MaybeAuth::from_request_parts(parts, state).await? {
            MaybeAuth(Some(identity)) => Ok(Auth(identity)),
            MaybeAuth(None) => Err(AuthError::MissingAuthHeader),
        }
    }
}

/// Optional authentication extractor.
///
/// `None` for requests without a credential. A credential that is present
/// but invalid is still rejected.
pub struct MaybeAuth(pub Option<Identity>);

impl FromRequestParts<AppState> for MaybeAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if middleware already decided
        match from_extensions(&parts.extensions) {
            Some(Authenticated::Identity(identity)) => return Ok(MaybeAuth(Some(identity.clone()))),
            Some(Authenticated::Anonymous) => return Ok(MaybeAuth(None)),
            None => {}
        }

        match state.authenticator.authenticate(&parts.headers).await {
            AuthOutcome::Authenticated(identity) => {
                parts.extensions.insert(identity.clone());
                Ok(MaybeAuth(Some(identity)))
            }
            AuthOutcome::NoCredential => Ok(MaybeAuth(None)),
            AuthOutcome::Rejected(reason) => Err(reason.into()),
        }
    }
}
