// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for the agent gateway, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Deployment mode and credential validation settings
// - Upstream integrations, extra proxy routes and public routes
// - Agent backends and exchange behaviour
// - Observability settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::identity::{DeploymentMode, RoleTier};
use super::route::{MethodFilter, ProxyRoute, RewriteRule};

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "GatewayConfig";

const SUPPORTED_ALGORITHMS: &[&str] = &[
    "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256",
    "ES384", "EdDSA",
];

pub type GatewayConfig = GatewayConfigManifest;

/// Top-level Kubernetes-style gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: GatewayConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfigSpec {
    /// Deployment mode; only `prod` disables the PRIVATE tier
    #[serde(default)]
    pub mode: DeploymentMode,

    /// Expose error details in responses even in production
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Built-in upstream integrations; an unset URL skips the integration
    #[serde(default)]
    pub integrations: IntegrationsConfig,

    /// Additional proxy routes
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Additional unauthenticated routes
    #[serde(default)]
    pub public_routes: Vec<PublicRouteConfig>,

    #[serde(default)]
    pub agents: Vec<AgentConfig>,

    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub health: HealthConfig,

    /// PostgreSQL persistence; in-memory storage when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Largest request body the proxy buffers before forwarding
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Connect, response-head and idle-read deadline for proxied calls
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    #[serde(default = "default_pool_max_idle")]
    pub upstream_pool_max_idle: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Inline PEM (or shared secret for HS*); supports `env:VAR_NAME`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<String>,

    #[serde(default)]
    pub leeway_secs: u64,

    /// Inject X-Authenticated-* headers into proxied requests
    #[serde(default = "default_true")]
    pub identity_headers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntegrationsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_service_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda_service_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_service_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,

    pub upstream: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_tier: Option<RoleTier>,

    #[serde(default)]
    pub rewrites: Vec<RewriteConfig>,
}

impl RouteConfig {
    pub fn to_route(&self) -> anyhow::Result<ProxyRoute> {
        let mut route = ProxyRoute::new(&self.prefix, &self.upstream, self.strip_prefix.as_deref())?
            .with_min_tier(self.min_tier.unwrap_or(RoleTier::Common));
        for rewrite in &self.rewrites {
            route = route.with_rewrite(RewriteRule::new(
                MethodFilter::parse(&rewrite.method)?,
                &rewrite.pattern,
                &rewrite.replace,
            )?);
        }
        Ok(route)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(default = "default_method")]
    pub method: String,

    /// Regex applied to the path tail after the route prefix
    pub pattern: String,

    pub replace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicRouteConfig {
    #[serde(default = "default_method")]
    pub method: String,

    /// Exact path, or prefix when ending in `*`
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    Openai,
    OpenaiCompatible,
    Ollama,
    Anthropic,
    Echo,
}

impl AgentKind {
    fn requires_endpoint(&self) -> bool {
        matches!(self, AgentKind::OpenaiCompatible | AgentKind::Ollama)
    }

    fn requires_model(&self) -> bool {
        !matches!(self, AgentKind::Echo)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique, case-insensitive agent name chats are bound to
    pub name: String,

    pub kind: AgentKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Supports `env:VAR_NAME`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// What happens to the persisted user message when generation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Leave the message as a record of the attempt
    #[default]
    Keep,
    /// Mark the message `failed`
    MarkFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub orphan_policy: OrphanPolicy,

    /// Agent used for chats without a binding; unbound chats fail when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_probe_timeout")]
    pub agent_probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL; supports `env:VAR_NAME`
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_pool_max_idle() -> usize {
    100
}

fn default_algorithm() -> String {
    "RS256".to_string()
}

fn default_method() -> String {
    "*".to_string()
}

fn default_agent_timeout() -> u64 {
    60
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9091
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_bind_address(),
            port: default_api_port(),
            max_body_bytes: default_max_body_bytes(),
            upstream_timeout_secs: default_upstream_timeout(),
            upstream_pool_max_idle: default_pool_max_idle(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            public_key: None,
            public_key_path: None,
            leeway_secs: 0,
            identity_headers: true,
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            orphan_policy: OrphanPolicy::Keep,
            default_agent: None,
            generation_timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            agent_probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "agent-gateway".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: GatewayConfigSpec::default(),
        }
    }
}

impl AuthConfig {
    /// Key material for the credential validator, from inline value or file.
    pub fn load_public_key(&self) -> anyhow::Result<String> {
        if let Some(key) = &self.public_key {
            return resolve_secret(key);
        }
        if let Some(path) = &self.public_key_path {
            return std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read public key at {}: {}", path, e));
        }
        anyhow::bail!("auth.public_key or auth.public_key_path must be set")
    }
}

/// Resolves `env:VAR_NAME` references, returning other values unchanged.
pub fn resolve_secret(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var)
            .map_err(|_| anyhow::anyhow!("Environment variable {} not set", var)),
        None => Ok(value.to_string()),
    }
}

impl GatewayConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. GATEWAY_CONFIG_PATH environment variable
    /// 2. ./gateway-config.yaml (working directory)
    /// 3. ~/.agent-gateway/config.yaml (user home)
    /// 4. /etc/agent-gateway/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("GATEWAY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./gateway-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".agent-gateway").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/agent-gateway/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let spec = &mut self.spec;

        if let Some(val) = lookup("MODE") {
            match val.parse::<DeploymentMode>() {
                Ok(mode) => {
                    tracing::info!("Environment override: MODE={}", mode);
                    spec.mode = mode;
                }
                Err(e) => tracing::warn!("Ignoring MODE override: {}", e),
            }
        }

        if let Some(val) = lookup("DEBUG") {
            match parse_bool(&val) {
                Some(debug) => spec.debug = debug,
                None => tracing::warn!(
                    "Invalid value for DEBUG: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("JWT_ALGORITHM") {
            spec.auth.algorithm = val;
        }
        if let Some(val) = lookup("JWT_PUBLIC_KEY") {
            spec.auth.public_key = Some(val);
            spec.auth.public_key_path = None;
        }

        if let Some(val) = lookup("AUTH_SERVICE_URL") {
            spec.integrations.auth_service_url = Some(val);
        }
        if let Some(val) = lookup("AGENDA_SERVICE_URL") {
            spec.integrations.agenda_service_url = Some(val);
        }
        if let Some(val) = lookup("SNAPSHOT_SERVICE_URL") {
            spec.integrations.snapshot_service_url = Some(val);
        }

        if let Some(url) = lookup("DATABASE_URL") {
            match &mut spec.database {
                Some(db) => db.url = url,
                None => {
                    spec.database = Some(DatabaseConfig {
                        url,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }

        let level = lookup("LOG_LEVEL");
        let json = lookup("LOG_JSON").and_then(|v| parse_bool(&v));
        if level.is_some() || json.is_some() {
            let observability = spec.observability.get_or_insert(ObservabilityConfig {
                logging: None,
                metrics: None,
            });
            let logging = observability.logging.get_or_insert(LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            });
            if let Some(level) = level {
                logging.level = level;
            }
            if let Some(json) = json {
                logging.format = if json { "json" } else { "text" }.to_string();
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;

        if spec.server.port == 0 {
            anyhow::bail!("spec.server.port cannot be 0");
        }
        if spec.server.max_body_bytes == 0 {
            anyhow::bail!("spec.server.max_body_bytes must be greater than 0");
        }
        if spec.server.upstream_timeout_secs == 0 {
            anyhow::bail!("spec.server.upstream_timeout_secs must be greater than 0");
        }

        if !SUPPORTED_ALGORITHMS.contains(&spec.auth.algorithm.as_str()) {
            anyhow::bail!(
                "Unsupported JWT algorithm '{}'. Expected one of: {}",
                spec.auth.algorithm,
                SUPPORTED_ALGORITHMS.join(", ")
            );
        }
        if spec.auth.public_key.is_none() && spec.auth.public_key_path.is_none() {
            anyhow::bail!("spec.auth.public_key or spec.auth.public_key_path must be set");
        }

        for (name, url) in [
            ("auth_service_url", &spec.integrations.auth_service_url),
            ("agenda_service_url", &spec.integrations.agenda_service_url),
            ("snapshot_service_url", &spec.integrations.snapshot_service_url),
        ] {
            if let Some(url) = url {
                url::Url::parse(url).map_err(|e| {
                    anyhow::anyhow!("spec.integrations.{} is not a valid URL: {}", name, e)
                })?;
            }
        }

        for route in &spec.routes {
            route
                .to_route()
                .map_err(|e| anyhow::anyhow!("Invalid route '{}': {}", route.prefix, e))?;
        }

        for public in &spec.public_routes {
            MethodFilter::parse(&public.method)?;
            if !public.path.starts_with('/') {
                anyhow::bail!("Public route path must start with '/': {}", public.path);
            }
        }

        let mut names = HashSet::new();
        for agent in &spec.agents {
            if agent.name.trim().is_empty() {
                anyhow::bail!("Agent name cannot be empty");
            }
            if !names.insert(agent.name.to_lowercase()) {
                anyhow::bail!("Duplicate agent name: {}", agent.name);
            }
            if agent.kind.requires_endpoint() && agent.endpoint.is_none() {
                anyhow::bail!("Agent endpoint cannot be empty for: {}", agent.name);
            }
            if agent.kind.requires_model() && agent.model.is_none() {
                anyhow::bail!("Agent model cannot be empty for: {}", agent.name);
            }
            if agent.timeout_secs == 0 {
                anyhow::bail!("Agent timeout must be greater than 0 for: {}", agent.name);
            }
        }

        if let Some(default_agent) = &spec.exchange.default_agent {
            let found = spec
                .agents
                .iter()
                .any(|a| a.enabled && a.name.eq_ignore_ascii_case(default_agent));
            if !found {
                anyhow::bail!("Default agent '{}' not found in enabled agents", default_agent);
            }
        }
        if spec.exchange.generation_timeout_secs == 0 {
            anyhow::bail!("spec.exchange.generation_timeout_secs must be greater than 0");
        }

        if let Some(db) = &spec.database {
            if db.url.is_empty() {
                anyhow::bail!("spec.database.url cannot be empty");
            }
        }

        Ok(())
    }

    /// Log level and JSON flag, falling back to `default_level`.
    pub fn logging(&self, default_level: &str) -> (String, bool) {
        match self
            .spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.as_ref())
        {
            Some(logging) => (logging.level.clone(), logging.format == "json"),
            None => (default_level.to_string(), false),
        }
    }

    /// Whether error responses may carry diagnostic details.
    pub fn expose_error_details(&self) -> bool {
        !self.spec.mode.is_production() || self.spec.debug
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
