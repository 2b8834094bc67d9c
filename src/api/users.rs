// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, ClaimSet, Identity, MaybeAuth};
use crate::models::UserRecord;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Local user record, provisioned on first sight of the subject
    pub user: UserRecord,
    /// Verified token claims
    #[schema(value_type = Object)]
    pub claims: ClaimSet,
}

impl From<Identity> for UserMeResponse {
    fn from(identity: Identity) -> Self {
        Self {
            user: identity.user,
            claims: identity.claims,
        }
    }
}

/// Response for GET /v1/session
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Whether the request carried a verified bearer token
    pub authenticated: bool,
    /// Subject of the verified token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Get the current authenticated user's information.
///
/// Returns the local user record and the verified claims of the presented token.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 503, description = "Signing keys temporarily unavailable"),
    )
)]
pub async fn get_current_user(Auth(identity): Auth) -> Json<UserMeResponse> {
    Json(identity.into())
}

/// Report whether the request is authenticated.
///
/// Anonymous requests succeed; a presented but invalid token is still rejected.
#[utoipa::path(
    get,
    path = "/v1/session",
    tag = "Users",
    security((), ("bearer" = [])),
    responses(
        (status = 200, description = "Session status", body = SessionResponse),
        (status = 401, description = "Unauthorized - invalid token"),
    )
)]
pub async fn get_session(MaybeAuth(identity): MaybeAuth) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: identity.is_some(),
        subject: identity.map(|identity| identity.user.subject),
    })
}
