// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Identity and Role Policy
//!
//! Verified caller identity, the closed set of access tiers, and the
//! deployment-aware decision function that gates every protected route.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Authentication outcome types and authorization rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment mode of the running process.
///
/// Only [`DeploymentMode::Prod`] counts as production for the role policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Prod,
    Stage,
    #[default]
    Dev,
    Test,
}

impl DeploymentMode {
    pub fn is_production(&self) -> bool {
        matches!(self, DeploymentMode::Prod)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Prod => "prod",
            DeploymentMode::Stage => "stage",
            DeploymentMode::Dev => "dev",
            DeploymentMode::Test => "test",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(DeploymentMode::Prod),
            "stage" | "staging" => Ok(DeploymentMode::Stage),
            "dev" | "development" => Ok(DeploymentMode::Dev),
            "test" => Ok(DeploymentMode::Test),
            other => Err(format!("unknown deployment mode '{}'", other)),
        }
    }
}

/// Access tier required by a route and held by an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleTier {
    Admin,
    Staff,
    Common,
    Private,
}

impl RoleTier {
    /// Maps the `role` claim of a validated token onto a tier.
    ///
    /// A token without a role claim is an ordinary authenticated user.
    pub fn from_claim(claim: Option<&str>) -> Result<Self, AuthError> {
        let Some(raw) = claim else {
            return Ok(RoleTier::Common);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(RoleTier::Admin),
            "manager" | "staff" => Ok(RoleTier::Staff),
            "user" | "common" => Ok(RoleTier::Common),
            "developer" | "private" => Ok(RoleTier::Private),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTier::Admin => "ADMIN",
            RoleTier::Staff => "STAFF",
            RoleTier::Common => "COMMON",
            RoleTier::Private => "PRIVATE",
        }
    }

    // PRIVATE sits outside the ordering.
    fn rank(&self) -> Option<u8> {
        match self {
            RoleTier::Admin => Some(3),
            RoleTier::Staff => Some(2),
            RoleTier::Common => Some(1),
            RoleTier::Private => None,
        }
    }
}

impl fmt::Display for RoleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(RoleTier::Admin),
            "staff" => Ok(RoleTier::Staff),
            "common" => Ok(RoleTier::Common),
            "private" => Ok(RoleTier::Private),
            other => Err(format!("unknown role tier '{}'", other)),
        }
    }
}

/// Caller identity derived from a validated bearer token.
///
/// Attached to the request once authentication succeeds; downstream stages
/// receive it by reference or clone and never modify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject_id: String,
    pub role: RoleTier,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is missing or malformed")]
    MissingCredentials,

    #[error("Credentials are invalid or expired")]
    InvalidCredentials,

    #[error("Role {held} does not satisfy the required tier {required}")]
    InsufficientRole { required: RoleTier, held: RoleTier },
}

/// Port for bearer token verification.
///
/// Implementations hold their key material in memory; validation performs no I/O.
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let value = header_value.ok_or(AuthError::MissingCredentials)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MissingCredentials)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(token)
}

/// Decides whether `held` satisfies `required` under the given deployment mode.
///
/// ADMIN covers STAFF which covers COMMON. PRIVATE is never granted in
/// production; outside production a PRIVATE identity satisfies every tier.
pub fn tier_satisfies(required: RoleTier, held: RoleTier, mode: DeploymentMode) -> bool {
    if mode.is_production() && (required == RoleTier::Private || held == RoleTier::Private) {
        return false;
    }
    match (required.rank(), held.rank()) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(required), Some(held)) => held >= required,
    }
}

/// Role policy bound to the process deployment mode.
#[derive(Debug, Clone, Copy)]
pub struct RolePolicy {
    mode: DeploymentMode,
}

impl RolePolicy {
    pub fn new(mode: DeploymentMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn authorize(&self, required: RoleTier, identity: &Identity) -> Result<(), AuthError> {
        if tier_satisfies(required, identity.role, self.mode) {
            Ok(())
        } else {
            Err(AuthError::InsufficientRole {
                required,
                held: identity.role,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: RoleTier) -> Identity {
        Identity {
            subject_id: "user-1".to_string(),
            role,
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn test_tier_ordering() {
        let mode = DeploymentMode::Dev;
        assert!(tier_satisfies(RoleTier::Common, RoleTier::Admin, mode));
        assert!(tier_satisfies(RoleTier::Staff, RoleTier::Admin, mode));
        assert!(tier_satisfies(RoleTier::Common, RoleTier::Staff, mode));
        assert!(tier_satisfies(RoleTier::Common, RoleTier::Common, mode));
        assert!(!tier_satisfies(RoleTier::Admin, RoleTier::Staff, mode));
        assert!(!tier_satisfies(RoleTier::Admin, RoleTier::Common, mode));
        assert!(!tier_satisfies(RoleTier::Staff, RoleTier::Common, mode));
    }

    #[test]
    fn test_private_tier_outside_production() {
        let mode = DeploymentMode::Stage;
        assert!(tier_satisfies(RoleTier::Private, RoleTier::Private, mode));
        assert!(!tier_satisfies(RoleTier::Private, RoleTier::Admin, mode));
        assert!(tier_satisfies(RoleTier::Admin, RoleTier::Private, mode));
    }

    #[test]
    fn test_private_tier_rejected_in_production() {
        let mode = DeploymentMode::Prod;
        for held in [RoleTier::Admin, RoleTier::Staff, RoleTier::Common, RoleTier::Private] {
            assert!(!tier_satisfies(RoleTier::Private, held, mode));
        }
        assert!(!tier_satisfies(RoleTier::Common, RoleTier::Private, mode));
    }

    #[test]
    fn test_policy_reports_insufficient_role() {
        let policy = RolePolicy::new(DeploymentMode::Dev);
        let err = policy
            .authorize(RoleTier::Admin, &identity(RoleTier::Common))
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::InsufficientRole {
                required: RoleTier::Admin,
                held: RoleTier::Common
            }
        );
        assert!(policy
            .authorize(RoleTier::Common, &identity(RoleTier::Common))
            .is_ok());
    }

    #[test]
    fn test_role_claim_mapping() {
        assert_eq!(RoleTier::from_claim(Some("ADMIN")), Ok(RoleTier::Admin));
        assert_eq!(RoleTier::from_claim(Some("manager")), Ok(RoleTier::Staff));
        assert_eq!(RoleTier::from_claim(Some("User")), Ok(RoleTier::Common));
        assert_eq!(RoleTier::from_claim(Some("developer")), Ok(RoleTier::Private));
        assert_eq!(RoleTier::from_claim(None), Ok(RoleTier::Common));
        assert_eq!(
            RoleTier::from_claim(Some("root")),
            Err(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(bearer_token(Some("bearer  abc")), Ok("abc"));
        assert_eq!(bearer_token(None), Err(AuthError::MissingCredentials));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AuthError::MissingCredentials));
        assert_eq!(bearer_token(Some("Bearer")), Err(AuthError::MissingCredentials));
        assert_eq!(bearer_token(Some("Bearer   ")), Err(AuthError::MissingCredentials));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("PROD".parse::<DeploymentMode>(), Ok(DeploymentMode::Prod));
        assert_eq!("staging".parse::<DeploymentMode>(), Ok(DeploymentMode::Stage));
        assert!("qa".parse::<DeploymentMode>().is_err());
        assert!(!DeploymentMode::Test.is_production());
    }
}
