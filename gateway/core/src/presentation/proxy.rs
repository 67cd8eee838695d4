// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reverse Proxy Middleware
//!
//! Forwards requests whose path matches a registered prefix to the route's
//! upstream and relays the upstream response. Requests with no matching
//! route continue to the local router untouched.
//!
//! The request body is buffered up to `server.max_body_bytes`; the response
//! body is streamed back as it arrives. The upstream timeout covers the
//! response head and idle gaps, not the length of the stream. Upstream status codes, including
//! 4xx/5xx and redirects, are relayed as-is.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::auth::invalid_path;
use super::error::ApiError;
use super::state::AppState;
use crate::domain::identity::Identity;
use crate::domain::route::{has_dot_segments, RouteMatch};
use crate::infrastructure::http_client::UpstreamSendError;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "te",
    "trailer",
    "upgrade",
    "proxy-authenticate",
    "proxy-authorization",
    "transfer-encoding",
    "host",
];

const IDENTITY_HEADER_PREFIX: &str = "x-authenticated-";
const USER_ID_HEADER: &str = "x-authenticated-user-id";
const ROLE_HEADER: &str = "x-authenticated-role";
const FORWARDED_FOR: &str = "x-forwarded-for";
const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Upstream for route '{route}' is unavailable")]
    Upstream { route: String, reason: String },

    #[error("Upstream for route '{route}' did not respond in time")]
    Timeout { route: String },

    #[error("Request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },
}

impl ProxyError {
    fn kind(&self) -> &'static str {
        match self {
            ProxyError::Upstream { .. } => "connect",
            ProxyError::Timeout { .. } => "timeout",
            ProxyError::BodyTooLarge { .. } => "body_too_large",
        }
    }
}

/// Forwards matching requests; everything else falls through to `next`.
pub async fn reverse_proxy(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if has_dot_segments(request.uri().path()) {
        return invalid_path(request.uri().path()).into_response();
    }
    let Some(route_match) = state.registry.resolve(request.method(), request.uri().path()) else {
        return next.run(request).await;
    };

    let prefix = route_match.route.prefix().to_string();
    let started = Instant::now();

    match forward(&state, &route_match, request).await {
        Ok(response) => {
            metrics::counter!(
                "gateway_proxy_requests_total",
                "route" => prefix.clone(),
                "status" => response.status().as_u16().to_string()
            )
            .increment(1);
            debug!(
                "Proxied {} -> {} ({:?})",
                prefix,
                response.status(),
                started.elapsed()
            );
            response
        }
        Err(err) => {
            warn!(
                route = %prefix,
                upstream = %route_match.route.upstream_base(),
                "Proxy request failed: {:?}",
                err
            );
            metrics::counter!(
                "gateway_proxy_upstream_errors_total",
                "route" => prefix.clone(),
                "kind" => err.kind()
            )
            .increment(1);
            let response = ApiError::from(err).into_response();
            metrics::counter!(
                "gateway_proxy_requests_total",
                "route" => prefix,
                "status" => response.status().as_u16().to_string()
            )
            .increment(1);
            response
        }
    }
}

async fn forward(
    state: &AppState,
    route_match: &RouteMatch<'_>,
    request: Request,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let limit = state.max_body_bytes;

    let declared_length = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_length.is_some_and(|len| len > limit) {
        return Err(ProxyError::BodyTooLarge { limit });
    }
    // A read error here is almost always the limit tripping on a chunked body
    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| ProxyError::BodyTooLarge { limit })?;

    let target = route_match.target_url(parts.uri.query());
    let headers = upstream_request_headers(&parts, state.identity_headers);

    let request = state
        .upstream
        .inner()
        .request(parts.method.clone(), &target)
        .headers(headers)
        .body(body);
    let upstream = state.upstream.send(request).await.map_err(|e| {
        let route = route_match.route.prefix().to_string();
        match e {
            UpstreamSendError::Timeout => ProxyError::Timeout { route },
            UpstreamSendError::Failed(reason) => ProxyError::Upstream { route, reason },
        }
    })?;

    let status = upstream.status();
    let headers = filter_headers(upstream.headers(), &[header::CONTENT_LENGTH.as_str()]);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Headers sent upstream: hop-by-hop and spoofed identity headers removed,
/// forwarding headers and the verified identity added.
fn upstream_request_headers(parts: &Parts, identity_headers: bool) -> HeaderMap {
    let mut headers = filter_headers(&parts.headers, &[header::CONTENT_LENGTH.as_str()]);
    strip_identity_headers(&mut headers);

    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    if let Some(ip) = client_ip {
        let value = match parts
            .headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) => format!("{}, {}", existing, ip),
            None => ip,
        };
        insert_header(&mut headers, FORWARDED_FOR, &value);
    }

    if !headers.contains_key(FORWARDED_PROTO) {
        let proto = parts.uri.scheme_str().unwrap_or("http").to_string();
        insert_header(&mut headers, FORWARDED_PROTO, &proto);
    }
    if let Some(host) = parts.headers.get(header::HOST) {
        headers.insert(HeaderName::from_static(FORWARDED_HOST), host.clone());
    }

    if identity_headers {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            insert_header(&mut headers, USER_ID_HEADER, &identity.subject_id);
            insert_header(&mut headers, ROLE_HEADER, identity.role.as_str());
        }
    }

    headers
}

/// Copies `source`, dropping hop-by-hop headers, headers named in
/// `Connection`, and `extra`.
fn filter_headers(source: &HeaderMap, extra: &[&str]) -> HeaderMap {
    let connection_listed: Vec<String> = source
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        let name_str = name.as_str();
        if HOP_BY_HOP.contains(&name_str)
            || extra.contains(&name_str)
            || connection_listed.iter().any(|listed| listed == name_str)
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => warn!("Dropping unrepresentable {} header value", name),
    }
}

// Clients must never be able to assert an identity to upstreams.
fn strip_identity_headers(headers: &mut HeaderMap) {
    let spoofed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(IDENTITY_HEADER_PREFIX))
        .cloned()
        .collect();
    for name in spoofed {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::RoleTier;
    use axum::http::Request as HttpRequest;
    use chrono::Utc;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_hop_by_hop_and_connection_listed_headers_dropped() {
        let mut source = HeaderMap::new();
        source.insert("connection", HeaderValue::from_static("keep-alive, x-session-hint"));
        source.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        source.insert("x-session-hint", HeaderValue::from_static("abc"));
        source.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        source.insert("content-length", HeaderValue::from_static("12"));
        source.insert("content-type", HeaderValue::from_static("application/json"));
        source.append("set-cookie", HeaderValue::from_static("a=1"));
        source.append("set-cookie", HeaderValue::from_static("b=2"));

        let filtered = filter_headers(&source, &["content-length"]);
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered["content-type"], "application/json");
        assert_eq!(filtered.get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_identity_headers_replace_client_values() {
        let mut parts = parts(
            HttpRequest::builder()
                .uri("/api/v1/agenda/calendars")
                .header("host", "gateway.local")
                .header("authorization", "Bearer token")
                .header("x-authenticated-user-id", "admin")
                .header("x-authenticated-tenant", "other"),
        );
        parts.extensions.insert(Identity {
            subject_id: "42".to_string(),
            role: RoleTier::Staff,
            expires_at: Utc::now(),
        });
        parts
            .extensions
            .insert(ConnectInfo("10.0.0.7:55000".parse::<SocketAddr>().unwrap()));

        let headers = upstream_request_headers(&parts, true);
        assert_eq!(headers[USER_ID_HEADER], "42");
        assert_eq!(headers[ROLE_HEADER], "STAFF");
        assert!(!headers.contains_key("x-authenticated-tenant"));
        assert!(!headers.contains_key("host"));
        assert_eq!(headers["authorization"], "Bearer token");
        assert_eq!(headers[FORWARDED_FOR], "10.0.0.7");
        assert_eq!(headers[FORWARDED_HOST], "gateway.local");
        assert_eq!(headers[FORWARDED_PROTO], "http");
    }

    #[test]
    fn test_identity_headers_disabled_still_strips_spoofing() {
        let mut parts = parts(
            HttpRequest::builder()
                .uri("/api/v1/snapshot")
                .header("x-forwarded-for", "203.0.113.9")
                .header("x-authenticated-role", "ADMIN"),
        );
        parts.extensions.insert(Identity {
            subject_id: "42".to_string(),
            role: RoleTier::Common,
            expires_at: Utc::now(),
        });
        parts
            .extensions
            .insert(ConnectInfo("10.0.0.7:55000".parse::<SocketAddr>().unwrap()));

        let headers = upstream_request_headers(&parts, false);
        assert!(!headers.contains_key(ROLE_HEADER));
        assert!(!headers.contains_key(USER_ID_HEADER));
        assert_eq!(headers[FORWARDED_FOR], "203.0.113.9, 10.0.0.7");
    }
}
