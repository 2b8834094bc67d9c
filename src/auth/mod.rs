// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token authentication against a trust authority (Auth0) that
//! publishes its signing keys as a JWKS document.
//!
//! ## Auth Flow
//!
//! 1. Client authenticates with the trust authority
//! 2. Client sends `Authorization: Bearer <access token>`
//! 3. Server:
//!    - Resolves the signing key by `kid` from the cached JWKS
//!      (one forced refresh when the `kid` is unknown)
//!    - Verifies signature, issuer, audience, expiry, not-before
//!    - Provisions a local user for `sub` on first sight
//!
//! ## Components
//!
//! - [`jwks`]: key set cache and remote source
//! - [`resolver`]: header `kid` → verification key
//! - [`verifier`]: signature and claim checks
//! - [`authenticator`]: header parsing, verification, provisioning
//! - [`middleware`] / [`extractor`]: Axum integration
//!
//! ## Security
//!
//! - The allowed algorithms are fixed at startup, never taken from the token
//! - JWKS is fetched over HTTPS only
//! - Callers only ever see a reason code, never library or network detail
//! - Tokens are never logged

pub mod authenticator;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod resolver;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

pub use authenticator::{AuthOutcome, Authenticator, Identity};
pub use error::{AuthError, InvalidReason, RejectReason};
pub use extractor::{Auth, MaybeAuth};
pub use jwks::{HttpKeySetSource, KeySet, KeySetCache, KeySetSource};
pub use verifier::{ClaimSet, TokenVerifier};
