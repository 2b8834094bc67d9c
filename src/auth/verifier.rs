// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! ## Pipeline
//!
//! 1. Structural parse of the compact form
//! 2. Key resolution against the cached key set
//! 3. Signature check, restricted to the configured algorithm allow-list
//! 4. Claim checks (issuer, audience, expiry, not-before)
//! 5. Subject presence
//!
//! ## Security
//!
//! - No [`ClaimSet`] leaves this module without a verified signature
//! - Claim checks are evaluated independently; every failure is logged and
//!   the first in a fixed order is reported
//! - Expiry is checked without leeway: `exp == now` is already expired

use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::error::{InvalidReason, KeyResolutionError, VerifyError};
use super::resolver::KeyResolver;

/// Tokens longer than this are rejected before any parsing.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// The `aud` claim, which may be a single string or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(value) => value == audience,
            Audience::Many(values) => values.iter().any(|value| value == audience),
        }
    }
}

/// Verified token payload.
///
/// Registered claims are typed; everything else the authority put in the
/// token is kept in `extra`. Time claims are NumericDates, which may carry a
/// fractional part, so they keep the JSON number as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClaimSet {
    /// Subject identifier. Non-empty on every set returned by [`TokenVerifier`].
    pub fn subject(&self) -> &str {
        self.sub.as_deref().unwrap_or_default()
    }
}

/// Expected issuer and audience, plus not-before leeway.
#[derive(Debug, Clone)]
pub struct ClaimPolicy {
    issuer: String,
    audience: String,
    leeway_secs: u64,
}

impl ClaimPolicy {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_secs: 0,
        }
    }

    /// Clock skew tolerated on `nbf`. Expiry never gets leeway.
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Check the registered claims at time `now` (unix seconds).
    pub fn check(&self, claims: &ClaimSet, now: i64) -> Result<(), InvalidReason> {
        let leeway = i64::try_from(self.leeway_secs).unwrap_or(i64::MAX);
        let exp = claims.exp.as_ref().and_then(Number::as_f64);
        let nbf = claims.nbf.as_ref().and_then(Number::as_f64);

        let failures: Vec<InvalidReason> = [
            (claims.iss.as_deref() != Some(self.issuer.as_str())).then_some(InvalidReason::BadIssuer),
            (!claims.aud.as_ref().is_some_and(|aud| aud.contains(&self.audience)))
                .then_some(InvalidReason::BadAudience),
            (!exp.is_some_and(|exp| exp > now as f64)).then_some(InvalidReason::Expired),
            nbf.is_some_and(|nbf| nbf > now.saturating_add(leeway) as f64)
                .then_some(InvalidReason::NotYetValid),
        ]
        .into_iter()
        .flatten()
        .collect();

        match failures.first() {
            None => Ok(()),
            Some(first) => {
                tracing::debug!(failures = ?failures, "Token claims rejected");
                Err(*first)
            }
        }
    }
}

/// Verifies compact JWS bearer tokens.
pub struct TokenVerifier {
    resolver: KeyResolver,
    policy: ClaimPolicy,
}

impl TokenVerifier {
    pub fn new(resolver: KeyResolver, policy: ClaimPolicy) -> Self {
        Self { resolver, policy }
    }

    pub fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }

    /// Verify a token against the current time.
    pub async fn verify(&self, token: &str) -> Result<ClaimSet, VerifyError> {
        self.verify_at(token, Utc::now().timestamp()).await
    }

    pub(crate) async fn verify_at(&self, token: &str, now: i64) -> Result<ClaimSet, VerifyError> {
        if token.len() > MAX_TOKEN_SIZE_BYTES || !is_compact_jws(token) {
            return Err(InvalidReason::Malformed.into());
        }

        let key = self.resolver.resolve(token).await.map_err(|e| match e {
            KeyResolutionError::UnparseableHeader => VerifyError::from(InvalidReason::Malformed),
            KeyResolutionError::KeySet(fetch) => VerifyError::KeySetUnavailable(fetch),
            other => {
                tracing::warn!(error = %other, "Token signing key could not be resolved");
                VerifyError::from(InvalidReason::KeyUnresolved)
            }
        })?;

        let mut validation = Validation::new(key.algorithm);
        validation.algorithms = vec![key.algorithm];
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let claims = decode::<ClaimSet>(token, &key.key, &validation)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        InvalidReason::BadSignature
                    }
                    ErrorKind::Json(_)
                    | ErrorKind::Base64(_)
                    | ErrorKind::Utf8(_)
                    | ErrorKind::InvalidToken => InvalidReason::Malformed,
                    _ => InvalidReason::BadSignature,
                };
                tracing::warn!(kid = %key.key_id, reason = %reason, "Token signature check failed");
                reason
            })?
            .claims;

        self.policy.check(&claims, now)?;

        if claims.sub.as_deref().is_none_or(str::is_empty) {
            return Err(InvalidReason::MissingSubject.into());
        }

        tracing::debug!(sub = %claims.subject(), kid = %key.key_id, "Token verified");
        Ok(claims)
    }
}

/// Three non-empty base64url segments.
fn is_compact_jws(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}
