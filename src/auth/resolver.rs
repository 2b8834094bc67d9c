// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing key resolution.
//!
//! The token header is read without verifying anything. Its `kid` is only a
//! lookup key into the cached set, and its `alg` must already be on the
//! allow-list fixed at startup. The header never widens what is accepted.

use std::sync::Arc;

use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{decode_header, Algorithm, DecodingKey, Header};

use super::error::KeyResolutionError;
use super::jwks::KeySetCache;

/// A verification key ready for signature checking.
pub struct ResolvedKey {
    pub key_id: String,
    pub algorithm: Algorithm,
    pub key: DecodingKey,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Picks the key a token was signed with.
pub struct KeyResolver {
    cache: Arc<KeySetCache>,
    allowed_algorithms: Vec<Algorithm>,
}

impl KeyResolver {
    pub fn new(cache: Arc<KeySetCache>, allowed_algorithms: Vec<Algorithm>) -> Self {
        Self {
            cache,
            allowed_algorithms,
        }
    }

    /// Resolve the key for a compact token.
    pub async fn resolve(&self, token: &str) -> Result<ResolvedKey, KeyResolutionError> {
        let header = decode_header(token).map_err(|_| KeyResolutionError::UnparseableHeader)?;
        self.resolve_header(&header).await
    }

    /// Resolve the key for an already-parsed (still unverified) header.
    ///
    /// On a `kid` miss the cache is asked for one forced refresh, then the
    /// lookup is retried exactly once.
    pub async fn resolve_header(&self, header: &Header) -> Result<ResolvedKey, KeyResolutionError> {
        let kid = header
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(KeyResolutionError::MissingKeyId)?;

        if !self.allowed_algorithms.contains(&header.alg) {
            return Err(KeyResolutionError::AlgorithmNotAllowed(header.alg));
        }

        let keys = self.cache.key_set().await?;
        let jwk = match keys.find(kid) {
            Some(jwk) => jwk.clone(),
            None => {
                tracing::debug!(kid = %kid, "Key id not in cached key set, refreshing");
                let refreshed = self.cache.refresh_after_miss(&keys).await?;
                match refreshed.find(kid) {
                    Some(jwk) => jwk.clone(),
                    None => {
                        tracing::warn!(kid = %kid, "Key id not found after refresh");
                        return Err(KeyResolutionError::UnknownKeyId(kid.to_string()));
                    }
                }
            }
        };

        let key = verification_key(kid, &jwk, header.alg)?;
        Ok(ResolvedKey {
            key_id: kid.to_string(),
            algorithm: header.alg,
            key,
        })
    }
}

/// Convert a published JWK into a key for `algorithm`.
fn verification_key(
    kid: &str,
    jwk: &Jwk,
    algorithm: Algorithm,
) -> Result<DecodingKey, KeyResolutionError> {
    if !matches!(jwk.common.public_key_use, None | Some(PublicKeyUse::Signature)) {
        return Err(KeyResolutionError::IncompatibleKey(kid.to_string()));
    }

    if let Some(declared) = jwk.common.key_algorithm {
        if signing_algorithm(declared) != Some(algorithm) {
            return Err(KeyResolutionError::AlgorithmMismatch {
                kid: kid.to_string(),
                algorithm,
            });
        }
    }

    let key = match (&jwk.algorithm, algorithm) {
        (
            AlgorithmParameters::RSA(rsa),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
        ) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e),
        (AlgorithmParameters::EllipticCurve(ec), Algorithm::ES256)
            if ec.curve == EllipticCurve::P256 =>
        {
            DecodingKey::from_ec_components(&ec.x, &ec.y)
        }
        (AlgorithmParameters::EllipticCurve(ec), Algorithm::ES384)
            if ec.curve == EllipticCurve::P384 =>
        {
            DecodingKey::from_ec_components(&ec.x, &ec.y)
        }
        (AlgorithmParameters::OctetKeyPair(okp), Algorithm::EdDSA) => {
            DecodingKey::from_ed_components(&okp.x)
        }
        _ => return Err(KeyResolutionError::IncompatibleKey(kid.to_string())),
    };

    key.map_err(|e| KeyResolutionError::MalformedKey {
        kid: kid.to_string(),
        reason: e.to_string(),
    })
}

/// The signing algorithm a JWK `alg` names, if it names one.
fn signing_algorithm(declared: KeyAlgorithm) -> Option<Algorithm> {
    match declared {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        // Key-management algorithms never sign.
        _ => None,
    }
}
