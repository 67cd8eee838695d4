// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Authentication Middleware
//!
//! Runs before the proxy and the local router. Public routes pass through
//! without an identity; every other request must carry a valid bearer token.
//! The verified [`Identity`] is attached to the request extensions for the
//! later stages.
//!
//! Proxied paths are authorized here against the route's minimum tier.
//! Local routes declare their tier with [`require_tier`]. Paths with dot
//! segments are refused before any of these checks.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;
use super::state::AppState;
use crate::domain::identity::{bearer_token, AuthError, Identity, RolePolicy, RoleTier};
use crate::domain::route::has_dot_segments;

pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    if has_dot_segments(&path) {
        debug!("Rejecting {} {} with dot segments", method, path);
        return Err(invalid_path(&path));
    }

    if state.registry.is_public(&method, &path) {
        return Ok(next.run(request).await);
    }

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let identity = bearer_token(header_value)
        .and_then(|token| state.validator.validate(token))
        .inspect_err(|e| debug!("Authentication failed for {} {}: {}", method, path, e))?;

    if let Some(route_match) = state.registry.resolve(&method, &path) {
        state
            .policy
            .authorize(route_match.route.min_tier(), &identity)
            .inspect_err(|e| debug!("Denied {} {} for {}: {}", method, path, identity.subject_id, e))?;
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub(super) fn invalid_path(path: &str) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "InvalidPath",
        format!("Path '{}' must not contain dot segments", path),
    )
}

/// Route layer enforcing a minimum tier on local endpoints.
///
/// ```ignore
/// .route_layer(from_fn_with_state((policy, RoleTier::Staff), require_tier))
/// ```
pub async fn require_tier(
    State((policy, required)): State<(RolePolicy, RoleTier)>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .ok_or(AuthError::MissingCredentials)?;
    policy.authorize(required, identity)?;
    Ok(next.run(request).await)
}
