// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Route Registry
//!
//! Proxy route table populated once at startup and read-only while serving.
//! Matching is longest-prefix-wins on path segment boundaries.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Prefix → upstream bindings, rewrite rules and the public access table

use axum::http::Method;
use regex::Regex;
use std::fmt;
use url::Url;

use super::identity::RoleTier;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Route prefix '{0}' is already registered")]
    DuplicateRoute(String),

    #[error("Invalid route prefix '{0}': must start with '/' and contain no query or fragment")]
    InvalidPrefix(String),

    #[error("Strip prefix '{strip}' is not a segment-aligned prefix of route '{prefix}'")]
    InvalidStripPrefix { prefix: String, strip: String },

    #[error("Invalid upstream base '{url}': {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("Invalid rewrite rule '{pattern}': {reason}")]
    InvalidRewrite { pattern: String, reason: String },

    #[error("Unsupported HTTP method '{0}'")]
    InvalidMethod(String),
}

/// HTTP method matcher with a `*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    pub fn parse(value: &str) -> Result<Self, RouteError> {
        let value = value.trim();
        if value == "*" {
            return Ok(MethodFilter::Any);
        }
        Method::from_bytes(value.to_ascii_uppercase().as_bytes())
            .map(MethodFilter::Only)
            .map_err(|_| RouteError::InvalidMethod(value.to_string()))
    }

    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(m) => m == method,
        }
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Any => f.write_str("*"),
            MethodFilter::Only(m) => f.write_str(m.as_str()),
        }
    }
}

/// Replaces the forwarded path when method and path tail match.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pub method: MethodFilter,
    pub pattern: Regex,
    pub replacement: String,
}

impl RewriteRule {
    pub fn new(method: MethodFilter, pattern: &str, replacement: &str) -> Result<Self, RouteError> {
        let regex = Regex::new(pattern).map_err(|e| RouteError::InvalidRewrite {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        if !replacement.starts_with('/') {
            return Err(RouteError::InvalidRewrite {
                pattern: pattern.to_string(),
                reason: format!("replacement '{}' must start with '/'", replacement),
            });
        }
        Ok(Self {
            method,
            pattern: regex,
            replacement: replacement.to_string(),
        })
    }

    fn matches(&self, method: &Method, tail: &str) -> bool {
        self.method.matches(method) && self.pattern.is_match(tail)
    }
}

/// A single prefix → upstream binding.
#[derive(Debug, Clone)]
pub struct ProxyRoute {
    prefix: String,
    upstream_base: Url,
    strip_prefix: Option<String>,
    min_tier: RoleTier,
    rewrites: Vec<RewriteRule>,
}

impl ProxyRoute {
    pub fn new(
        prefix: &str,
        upstream_base: &str,
        strip_prefix: Option<&str>,
    ) -> Result<Self, RouteError> {
        let prefix = normalize_path_prefix(prefix)?;

        let upstream = Url::parse(upstream_base).map_err(|e| RouteError::InvalidUpstream {
            url: upstream_base.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(upstream.scheme(), "http" | "https") || upstream.host_str().is_none() {
            return Err(RouteError::InvalidUpstream {
                url: upstream_base.to_string(),
                reason: "expected an absolute http(s) URL".to_string(),
            });
        }
        if upstream.query().is_some() || upstream.fragment().is_some() {
            return Err(RouteError::InvalidUpstream {
                url: upstream_base.to_string(),
                reason: "query and fragment are not allowed".to_string(),
            });
        }

        let strip_prefix = match strip_prefix {
            Some(strip) => {
                let strip = normalize_path_prefix(strip)?;
                if !segment_prefix_of(&strip, &prefix) {
                    return Err(RouteError::InvalidStripPrefix { prefix, strip });
                }
                Some(strip)
            }
            None => None,
        };

        Ok(Self {
            prefix,
            upstream_base: upstream,
            strip_prefix,
            min_tier: RoleTier::Common,
            rewrites: Vec::new(),
        })
    }

    pub fn with_min_tier(mut self, tier: RoleTier) -> Self {
        self.min_tier = tier;
        self
    }

    pub fn with_rewrite(mut self, rule: RewriteRule) -> Self {
        self.rewrites.push(rule);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn upstream_base(&self) -> &Url {
        &self.upstream_base
    }

    pub fn strip_prefix(&self) -> Option<&str> {
        self.strip_prefix.as_deref()
    }

    pub fn min_tier(&self) -> RoleTier {
        self.min_tier
    }

    pub fn rewrites(&self) -> &[RewriteRule] {
        &self.rewrites
    }

    fn rewrite(&self, method: &Method, path: &str) -> String {
        let tail = if self.prefix == "/" {
            path
        } else {
            &path[self.prefix.len()..]
        };
        if let Some(rule) = self.rewrites.iter().find(|r| r.matches(method, tail)) {
            return rule.replacement.clone();
        }

        match &self.strip_prefix {
            Some(strip) if strip != "/" => {
                let rest = &path[strip.len()..];
                if rest.is_empty() {
                    "/".to_string()
                } else {
                    rest.to_string()
                }
            }
            _ => path.to_string(),
        }
    }
}

/// Result of a successful resolution.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a ProxyRoute,
    pub rewritten_path: String,
}

impl RouteMatch<'_> {
    /// `upstreamBase + rewrittenPath + ?query`.
    pub fn target_url(&self, query: Option<&str>) -> String {
        let base = self.route.upstream_base.as_str().trim_end_matches('/');
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", base, self.rewritten_path, q),
            _ => format!("{}{}", base, self.rewritten_path),
        }
    }
}

/// Request pattern that bypasses authentication.
///
/// A pattern ending in `*` matches by prefix, anything else matches exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicRoute {
    pub method: MethodFilter,
    pub pattern: String,
}

impl PublicRoute {
    pub fn allows(&self, method: &Method, path: &str) -> bool {
        if !self.method.matches(method) {
            return false;
        }
        match self.pattern.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == self.pattern,
        }
    }
}

/// Startup-only registration surface. [`RouteRegistryBuilder::build`] freezes it.
#[derive(Debug, Default)]
pub struct RouteRegistryBuilder {
    routes: Vec<ProxyRoute>,
    public: Vec<PublicRoute>,
}

impl RouteRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. A duplicate prefix is rejected and leaves the builder untouched.
    pub fn register(&mut self, route: ProxyRoute) -> Result<(), RouteError> {
        if self.routes.iter().any(|r| r.prefix == route.prefix) {
            return Err(RouteError::DuplicateRoute(route.prefix));
        }
        self.routes.push(route);
        Ok(())
    }

    pub fn add_public(&mut self, method: &str, pattern: &str) -> Result<(), RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::InvalidPrefix(pattern.to_string()));
        }
        let route = PublicRoute {
            method: MethodFilter::parse(method)?,
            pattern: pattern.to_string(),
        };
        if !self.public.contains(&route) {
            self.public.push(route);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn build(mut self) -> RouteRegistry {
        // Longest prefix first; prefixes are unique so the order is total.
        self.routes
            .sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then(a.prefix.cmp(&b.prefix)));
        RouteRegistry {
            routes: self.routes,
            public: self.public,
        }
    }
}

/// Immutable route table shared across request tasks.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: Vec<ProxyRoute>,
    public: Vec<PublicRoute>,
}

impl RouteRegistry {
    pub fn builder() -> RouteRegistryBuilder {
        RouteRegistryBuilder::new()
    }

    /// Finds the longest registered prefix of `path` and computes the forwarded path.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let route = self
            .routes
            .iter()
            .find(|r| segment_prefix_of(&r.prefix, path))?;
        Some(RouteMatch {
            route,
            rewritten_path: route.rewrite(method, path),
        })
    }

    pub fn is_public(&self, method: &Method, path: &str) -> bool {
        self.public.iter().any(|r| r.allows(method, path))
    }

    pub fn routes(&self) -> impl Iterator<Item = &ProxyRoute> {
        self.routes.iter()
    }

    pub fn public_routes(&self) -> &[PublicRoute] {
        &self.public
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn normalize_path_prefix(raw: &str) -> Result<String, RouteError> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('/') || trimmed.contains(['?', '#']) || trimmed.contains("//") {
        return Err(RouteError::InvalidPrefix(raw.to_string()));
    }
    let normalized = trimmed.trim_end_matches('/');
    if normalized.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(normalized.to_string())
    }
}

/// True when `path` carries a `.` or `..` segment, plain or percent-encoded,
/// or an encoded separator.
///
/// Public and tier checks match the raw path while the upstream URL gets
/// normalized, so such paths must never reach either.
pub fn has_dot_segments(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    if lowered.contains('\\') || lowered.contains("%2f") || lowered.contains("%5c") {
        return true;
    }
    lowered
        .split('/')
        .map(|segment| segment.replace("%2e", "."))
        .any(|segment| segment == "." || segment == "..")
}

/// True when `prefix` equals `path` or ends exactly at a `/` boundary of it.
fn segment_prefix_of(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(routes: Vec<ProxyRoute>) -> RouteRegistry {
        let mut builder = RouteRegistry::builder();
        for route in routes {
            builder.register(route).unwrap();
        }
        builder.build()
    }

    fn route(prefix: &str, upstream: &str) -> ProxyRoute {
        ProxyRoute::new(prefix, upstream, None).unwrap()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = registry(vec![
            route("/api/v1/agenda", "http://agenda:8000"),
            route("/api/v1/agenda/special", "http://special:8000"),
        ]);

        let m = registry
            .resolve(&Method::GET, "/api/v1/agenda/special/x")
            .unwrap();
        assert_eq!(m.route.prefix(), "/api/v1/agenda/special");
        assert_eq!(m.rewritten_path, "/api/v1/agenda/special/x");

        let m = registry.resolve(&Method::GET, "/api/v1/agenda/other").unwrap();
        assert_eq!(m.route.prefix(), "/api/v1/agenda");
    }

    #[test]
    fn test_matching_is_segment_aligned() {
        let registry = registry(vec![route("/api/v1/agenda", "http://agenda:8000")]);

        assert!(registry.resolve(&Method::GET, "/api/v1/agenda").is_some());
        assert!(registry.resolve(&Method::GET, "/api/v1/agenda/").is_some());
        assert!(registry.resolve(&Method::GET, "/api/v1/agendas").is_none());
        assert!(registry.resolve(&Method::GET, "/api/v1").is_none());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let registry = registry(vec![
            route("/a", "http://a:1"),
            route("/a/b", "http://b:1"),
            route("/c", "http://c:1"),
        ]);
        let first = registry.resolve(&Method::POST, "/a/b/c").unwrap();
        for _ in 0..16 {
            let again = registry.resolve(&Method::POST, "/a/b/c").unwrap();
            assert_eq!(again.route.prefix(), first.route.prefix());
            assert_eq!(again.rewritten_path, first.rewritten_path);
        }
    }

    #[test]
    fn test_duplicate_prefix_rejected_and_state_unchanged() {
        let mut builder = RouteRegistry::builder();
        builder.register(route("/api/v1/snapshot", "http://snapshot:8000")).unwrap();

        let err = builder
            .register(route("/api/v1/snapshot/", "http://elsewhere:9000"))
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute(ref p) if p == "/api/v1/snapshot"));
        assert_eq!(builder.len(), 1);

        let registry = builder.build();
        let m = registry.resolve(&Method::GET, "/api/v1/snapshot/x").unwrap();
        assert_eq!(m.route.upstream_base().host_str(), Some("snapshot"));
    }

    #[test]
    fn test_strip_prefix() {
        let registry = registry(vec![ProxyRoute::new(
            "/api/v1/agenda",
            "http://agenda:8000/api/v1",
            Some("/api/v1/agenda"),
        )
        .unwrap()]);

        let m = registry
            .resolve(&Method::GET, "/api/v1/agenda/calendars/7")
            .unwrap();
        assert_eq!(m.rewritten_path, "/calendars/7");
        assert_eq!(
            m.target_url(Some("from=2026-01-01")),
            "http://agenda:8000/api/v1/calendars/7?from=2026-01-01"
        );

        let m = registry.resolve(&Method::GET, "/api/v1/agenda").unwrap();
        assert_eq!(m.rewritten_path, "/");
    }

    #[test]
    fn test_strip_prefix_must_be_segment_prefix_of_route() {
        let err = ProxyRoute::new("/api/v1/agenda", "http://agenda:8000", Some("/agenda"))
            .unwrap_err();
        assert!(matches!(err, RouteError::InvalidStripPrefix { .. }));

        let err = ProxyRoute::new("/api/v1/agenda", "http://agenda:8000", Some("/api/v1/ag"))
            .unwrap_err();
        assert!(matches!(err, RouteError::InvalidStripPrefix { .. }));
    }

    #[test]
    fn test_rewrite_rules_apply_by_method() {
        let auth = route("/api/v1/auth", "http://auth:8000")
            .with_rewrite(
                RewriteRule::new(
                    MethodFilter::Only(Method::POST),
                    r"^/users(/|$)",
                    "/api/v1/users/register",
                )
                .unwrap(),
            )
            .with_rewrite(
                RewriteRule::new(MethodFilter::Only(Method::GET), r"^/users/me", "/api/v1/users/me")
                    .unwrap(),
            );
        let registry = registry(vec![auth]);

        let m = registry.resolve(&Method::POST, "/api/v1/auth/users/").unwrap();
        assert_eq!(m.rewritten_path, "/api/v1/users/register");

        let m = registry
            .resolve(&Method::POST, "/api/v1/auth/users/register")
            .unwrap();
        assert_eq!(m.rewritten_path, "/api/v1/users/register");

        let m = registry.resolve(&Method::GET, "/api/v1/auth/users/me").unwrap();
        assert_eq!(m.rewritten_path, "/api/v1/users/me");

        // No rule for GET /users/, path forwarded unchanged.
        let m = registry.resolve(&Method::GET, "/api/v1/auth/users/").unwrap();
        assert_eq!(m.rewritten_path, "/api/v1/auth/users/");
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        assert!(matches!(
            ProxyRoute::new("api/v1", "http://x:1", None),
            Err(RouteError::InvalidPrefix(_))
        ));
        assert!(matches!(
            ProxyRoute::new("/api?x=1", "http://x:1", None),
            Err(RouteError::InvalidPrefix(_))
        ));
        assert!(matches!(
            ProxyRoute::new("/api", "not a url", None),
            Err(RouteError::InvalidUpstream { .. })
        ));
        assert!(matches!(
            ProxyRoute::new("/api", "ftp://x/", None),
            Err(RouteError::InvalidUpstream { .. })
        ));
        assert!(RewriteRule::new(MethodFilter::Any, "(", "/x").is_err());
    }

    #[test]
    fn test_target_url_without_query() {
        let registry = registry(vec![route("/api/v1/snapshot", "http://snapshot:8000/")]);
        let m = registry.resolve(&Method::GET, "/api/v1/snapshot/runs").unwrap();
        assert_eq!(m.target_url(None), "http://snapshot:8000/api/v1/snapshot/runs");
        assert_eq!(m.target_url(Some("")), "http://snapshot:8000/api/v1/snapshot/runs");
    }

    #[test]
    fn test_public_routes() {
        let mut builder = RouteRegistry::builder();
        builder.add_public("GET", "/api/health/*").unwrap();
        builder.add_public("*", "/docs").unwrap();
        builder.add_public("post", "/api/v1/auth/sessions").unwrap();
        assert!(builder.add_public("FETCH ME", "/x").is_err());
        let registry = builder.build();

        assert!(registry.is_public(&Method::GET, "/api/health/ping"));
        assert!(!registry.is_public(&Method::POST, "/api/health/ping"));
        assert!(registry.is_public(&Method::DELETE, "/docs"));
        assert!(!registry.is_public(&Method::GET, "/docs/secret"));
        assert!(registry.is_public(&Method::POST, "/api/v1/auth/sessions"));
        assert!(!registry.is_public(&Method::GET, "/api/v1/auth/sessions"));
    }

    #[test]
    fn test_dot_segments_detected() {
        assert!(has_dot_segments("/api/v1/reports/public/../weekly"));
        assert!(has_dot_segments("/api/v1/reports/public/.."));
        assert!(has_dot_segments("/api/v1/./reports"));
        assert!(has_dot_segments("/api/v1/reports/public/%2e%2E/weekly"));
        assert!(has_dot_segments("/api/v1/reports/public/.%2e/weekly"));
        assert!(has_dot_segments("/api/v1/reports/public/..%2fweekly"));
        assert!(has_dot_segments("/api/v1/reports/public/..\\weekly"));

        assert!(!has_dot_segments("/api/v1/reports/weekly"));
        assert!(!has_dot_segments("/api/v1/files/report.v2..final"));
        assert!(!has_dot_segments("/api/v1/files/.hidden"));
        assert!(!has_dot_segments("/"));
    }
}
