// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, default values, and the [`Config`] loaded
//! from them once at startup. Nothing here changes for the lifetime of the
//! process.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH0_DOMAIN` | Trust authority domain | Required |
//! | `AUTH0_AUDIENCE` | Expected JWT audience claim | Required |
//! | `AUTH0_ISSUER` | Expected JWT issuer claim | `https://{AUTH0_DOMAIN}/` |
//! | `AUTH0_ALGORITHMS` | Comma-separated signing algorithm allow-list | `RS256` |
//! | `JWKS_FETCH_TIMEOUT_SECS` | Key set fetch timeout | `10` |
//! | `JWKS_MIN_REFRESH_INTERVAL_SECS` | Minimum spacing of forced refreshes | `5` |
//! | `JWKS_MAX_AGE_SECS` | Maximum age of the cached key set | unset (no expiry) |
//! | `CLOCK_SKEW_LEEWAY_SECS` | Leeway applied to `nbf` | `0` |
//! | `DATA_DIR` | Directory for the identity database | unset (in-memory) |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key | unset (plain HTTP) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::auth::jwks::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MIN_REFRESH_INTERVAL};

pub const AUTH0_DOMAIN_ENV: &str = "AUTH0_DOMAIN";
pub const AUTH0_AUDIENCE_ENV: &str = "AUTH0_AUDIENCE";
pub const AUTH0_ISSUER_ENV: &str = "AUTH0_ISSUER";
pub const AUTH0_ALGORITHMS_ENV: &str = "AUTH0_ALGORITHMS";
pub const JWKS_FETCH_TIMEOUT_ENV: &str = "JWKS_FETCH_TIMEOUT_SECS";
pub const JWKS_MIN_REFRESH_INTERVAL_ENV: &str = "JWKS_MIN_REFRESH_INTERVAL_SECS";
pub const JWKS_MAX_AGE_ENV: &str = "JWKS_MAX_AGE_SECS";
pub const CLOCK_SKEW_LEEWAY_ENV: &str = "CLOCK_SKEW_LEEWAY_SECS";

/// Directory holding `identities.redb`. Unset keeps identities in memory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// File name of the identity database below `DATA_DIR`.
pub const IDENTITY_DB_FILE: &str = "identities.redb";

/// Upper bound on `CLOCK_SKEW_LEEWAY_SECS`.
pub const MAX_CLOCK_SKEW_LEEWAY_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub domain: String,
    pub audience: String,
    pub issuer: String,
    pub algorithms: Vec<Algorithm>,
    pub fetch_timeout: Duration,
    pub min_refresh_interval: Duration,
    pub max_age: Option<Duration>,
    pub leeway_secs: u64,
    pub data_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Unsupported signing algorithm {0:?}: only asymmetric algorithms are allowed")]
    UnsupportedAlgorithm(String),

    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    IncompleteTls,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let domain = lookup(vars, AUTH0_DOMAIN_ENV)
            .ok_or(ConfigError::MissingEnvVar(AUTH0_DOMAIN_ENV))?
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();

        let audience = lookup(vars, AUTH0_AUDIENCE_ENV)
            .ok_or(ConfigError::MissingEnvVar(AUTH0_AUDIENCE_ENV))?
            .to_string();

        let issuer = lookup(vars, AUTH0_ISSUER_ENV)
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://{domain}/"));

        let algorithms = match lookup(vars, AUTH0_ALGORITHMS_ENV) {
            Some(list) => parse_algorithms(list)?,
            None => vec![Algorithm::RS256],
        };

        let fetch_timeout = parse_secs(vars, JWKS_FETCH_TIMEOUT_ENV)?.unwrap_or(DEFAULT_FETCH_TIMEOUT);
        if fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: JWKS_FETCH_TIMEOUT_ENV,
                reason: "must be greater than 0".to_string(),
            });
        }

        let min_refresh_interval = parse_secs(vars, JWKS_MIN_REFRESH_INTERVAL_ENV)?
            .unwrap_or(DEFAULT_MIN_REFRESH_INTERVAL);

        let max_age = parse_secs(vars, JWKS_MAX_AGE_ENV)?;

        let leeway_secs = parse_number::<u64>(vars, CLOCK_SKEW_LEEWAY_ENV)?.unwrap_or(0);
        if leeway_secs > MAX_CLOCK_SKEW_LEEWAY_SECS {
            return Err(ConfigError::InvalidValue {
                name: CLOCK_SKEW_LEEWAY_ENV,
                reason: format!("must not exceed {MAX_CLOCK_SKEW_LEEWAY_SECS} seconds"),
            });
        }

        let data_dir = lookup(vars, DATA_DIR_ENV).map(PathBuf::from);

        let host = lookup(vars, HOST_ENV).unwrap_or(DEFAULT_HOST).to_string();
        let port = parse_number::<u16>(vars, PORT_ENV)?.unwrap_or(DEFAULT_PORT);

        let tls = match (lookup(vars, TLS_CERT_PATH_ENV), lookup(vars, TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        let log_format = match lookup(vars, LOG_FORMAT_ENV) {
            None => LogFormat::default(),
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(value) if value.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(value) => {
                return Err(ConfigError::InvalidValue {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected 'json' or 'pretty', got '{value}'"),
                })
            }
        };

        Ok(Self {
            domain,
            audience,
            issuer,
            algorithms,
            fetch_timeout,
            min_refresh_interval,
            max_age,
            leeway_secs,
            data_dir,
            host,
            port,
            tls,
            log_format,
        })
    }

    /// Path of the identity database, if persistence is configured.
    pub fn identity_db_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(IDENTITY_DB_FILE))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_algorithms(list: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();
    for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let algorithm: Algorithm = name
            .parse()
            .map_err(|_| ConfigError::UnsupportedAlgorithm(name.to_string()))?;
        if matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ConfigError::UnsupportedAlgorithm(name.to_string()));
        }
        if !algorithms.contains(&algorithm) {
            algorithms.push(algorithm);
        }
    }

    if algorithms.is_empty() {
        return Err(ConfigError::InvalidValue {
            name: AUTH0_ALGORITHMS_ENV,
            reason: "must name at least one algorithm".to_string(),
        });
    }
    Ok(algorithms)
}

/// Trimmed value of `name`, treating blank as unset.
fn lookup<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_number<T>(
    vars: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(vars, name)
        .map(|value| {
            value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name,
                reason: format!("'{value}': {e}"),
            })
        })
        .transpose()
}

fn parse_secs(
    vars: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_number::<u64>(vars, name)?.map(Duration::from_secs))
}
