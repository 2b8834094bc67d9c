// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Runs the [`Authenticator`](super::Authenticator) once per request for a
//! router subtree:
//!
//! - verified token: the [`Identity`] is inserted into request extensions
//! - no credential: the request continues anonymously
//! - rejected credential: the request is answered with an [`AuthError`]
//!
//! Handlers read the identity through the [`Auth`](super::Auth) or
//! [`MaybeAuth`](super::MaybeAuth) extractors.
//!
//! ```rust,ignore
//! let v1 = Router::new()
//!     .route("/users/me", get(users::me))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), authenticate));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::authenticator::{AuthOutcome, Identity};
use super::error::AuthError;
use crate::state::AppState;

/// Authenticate the request and attach the identity, if any.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.authenticator.authenticate(request.headers()).await {
        AuthOutcome::Authenticated(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        AuthOutcome::NoCredential => {
            // Downstream extractors must not re-run authentication.
            request.extensions_mut().insert(Anonymous);
            next.run(request).await
        }
        AuthOutcome::Rejected(reason) => AuthError::from(reason).into_response(),
    }
}

/// Marker left by [`authenticate`] on requests that carried no credential.
#[derive(Debug, Clone, Copy)]
pub struct Anonymous;

/// What the middleware decided for this request, if it ran.
pub(crate) enum Authenticated<'a> {
    Identity(&'a Identity),
    Anonymous,
}

pub(crate) fn from_extensions(extensions: &axum::http::Extensions) -> Option<Authenticated<'_>> {
    if let Some(identity) = extensions.get::<Identity>() {
        return Some(Authenticated::Identity(identity));
    }
    extensions
        .get::<Anonymous>()
        .map(|_| Authenticated::Anonymous)
}
