// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CollabDesk Auth - bearer token authentication service
//!
//! Verifies access tokens issued by an Auth0 tenant against the tenant's
//! published JWKS and maps each verified subject to a local user record.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Key set cache, key resolution, token verification
//! - `config` - Environment configuration
//! - `storage` - Identity persistence (redb)
//! - `store` - In-memory identity store

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;
