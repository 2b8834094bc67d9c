// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! The verification pipeline produces typed errors at every stage
//! ([`KeyFetchError`], [`KeyResolutionError`], [`VerifyError`]). The
//! authenticator collapses them into a coarse [`RejectReason`], and only that
//! reason tag ever reaches the caller. Raw library or network messages stay in
//! the logs.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::Algorithm;
use serde::Serialize;

/// Failure to obtain the trust authority's key set.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyFetchError {
    /// The HTTP client could not be constructed.
    #[error("failed to build JWKS client: {0}")]
    Client(String),
    /// Connection or protocol failure talking to the JWKS endpoint.
    #[error("JWKS request failed: {0}")]
    Transport(String),
    /// The fetch did not complete within the configured timeout.
    #[error("JWKS request timed out")]
    Timeout,
    /// The endpoint answered with a non-success status.
    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),
    /// The response body is not a JWKS document.
    #[error("malformed JWKS payload: {0}")]
    Malformed(String),
}

/// Failure to turn a token header into a verification key.
#[derive(Debug, thiserror::Error)]
pub enum KeyResolutionError {
    #[error("token header cannot be parsed")]
    UnparseableHeader,
    #[error("token header has no key id")]
    MissingKeyId,
    #[error("algorithm {0:?} is not allowed")]
    AlgorithmNotAllowed(Algorithm),
    #[error("no key with id {0} in the key set")]
    UnknownKeyId(String),
    #[error("key {kid} is published for a different algorithm than {algorithm:?}")]
    AlgorithmMismatch { kid: String, algorithm: Algorithm },
    #[error("key {0} is not usable for signature verification")]
    IncompatibleKey(String),
    #[error("key {kid} has malformed material: {reason}")]
    MalformedKey { kid: String, reason: String },
    #[error(transparent)]
    KeySet(#[from] KeyFetchError),
}

/// Why a token was judged invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    Malformed,
    KeyUnresolved,
    BadSignature,
    Expired,
    NotYetValid,
    BadIssuer,
    BadAudience,
    MissingSubject,
}

impl InvalidReason {
    /// Machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            InvalidReason::Malformed => "malformed_token",
            InvalidReason::KeyUnresolved => "unknown_signing_key",
            InvalidReason::BadSignature => "invalid_signature",
            InvalidReason::Expired => "token_expired",
            InvalidReason::NotYetValid => "token_not_yet_valid",
            InvalidReason::BadIssuer => "invalid_issuer",
            InvalidReason::BadAudience => "invalid_audience",
            InvalidReason::MissingSubject => "missing_subject",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of a failed [`TokenVerifier::verify`](super::TokenVerifier::verify).
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("token invalid: {0}")]
    TokenInvalid(InvalidReason),
    /// The key set could not be fetched, so the token could not be judged.
    #[error("key set unavailable: {0}")]
    KeySetUnavailable(#[source] KeyFetchError),
}

impl VerifyError {
    /// The invalidity reason, if the token itself was at fault.
    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            VerifyError::TokenInvalid(reason) => Some(*reason),
            VerifyError::KeySetUnavailable(_) => None,
        }
    }
}

impl From<InvalidReason> for VerifyError {
    fn from(reason: InvalidReason) -> Self {
        VerifyError::TokenInvalid(reason)
    }
}

/// Coarse rejection tag handed to the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The `Authorization` header is present but not `Bearer <token>`.
    MalformedHeader,
    /// The bearer token failed verification.
    Token(InvalidReason),
    /// The trust authority's key set could not be fetched.
    KeySetUnavailable,
    /// The token was valid but the local identity could not be provisioned.
    IdentityUnavailable,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MalformedHeader => "invalid_auth_header",
            RejectReason::Token(reason) => reason.code(),
            RejectReason::KeySetUnavailable => "key_set_unavailable",
            RejectReason::IdentityUnavailable => "identity_unavailable",
        }
    }
}

impl From<VerifyError> for RejectReason {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::TokenInvalid(reason) => RejectReason::Token(reason),
            VerifyError::KeySetUnavailable(_) => RejectReason::KeySetUnavailable,
        }
    }
}

/// HTTP-facing authentication error.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present on a route that requires identity
    MissingAuthHeader,
    /// The authenticator rejected the credential
    Rejected(RejectReason),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::Rejected(reason) => reason.code(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::Rejected(RejectReason::MalformedHeader)
            | AuthError::Rejected(RejectReason::Token(_)) => StatusCode::UNAUTHORIZED,
            AuthError::Rejected(RejectReason::KeySetUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Rejected(RejectReason::IdentityUnavailable) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<RejectReason> for AuthError {
    fn from(reason: RejectReason) -> Self {
        AuthError::Rejected(reason)
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::Rejected(RejectReason::MalformedHeader) => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::Rejected(RejectReason::Token(InvalidReason::Expired)) => {
                write!(f, "Token has expired")
            }
            AuthError::Rejected(RejectReason::Token(_)) => write!(f, "Token is invalid"),
            AuthError::Rejected(RejectReason::KeySetUnavailable) => {
                write!(f, "Authentication is temporarily unavailable")
            }
            AuthError::Rejected(RejectReason::IdentityUnavailable) => {
                write!(f, "Internal authentication error")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
