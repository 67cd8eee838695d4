// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Bearer token validation backed by `jsonwebtoken`.
//
// The key is parsed once at startup, so validation is a pure CPU step with
// no I/O on the request path.

use anyhow::{Context, Result};
use chrono::DateTime;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use crate::domain::gateway_config::AuthConfig;
use crate::domain::identity::{AuthError, CredentialValidator, Identity, RoleTier};

#[derive(Debug, Deserialize)]
struct GatewayClaims {
    sub: String,
    exp: i64,
    #[serde(default)]
    role: Option<String>,
}

pub struct JwtCredentialValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCredentialValidator {
    /// `key` is a PEM document for asymmetric algorithms and the shared secret for HS*.
    pub fn new(algorithm: &str, key: &str, leeway_secs: u64) -> Result<Self> {
        let algorithm = Algorithm::from_str(algorithm)
            .map_err(|_| anyhow::anyhow!("Unsupported JWT algorithm '{}'", algorithm))?;

        let decoding_key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(key.as_bytes())
            }
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(key.as_bytes())
                .context("Failed to parse EC public key")?,
            Algorithm::EdDSA => DecodingKey::from_ed_pem(key.as_bytes())
                .context("Failed to parse Ed25519 public key")?,
            _ => DecodingKey::from_rsa_pem(key.as_bytes())
                .context("Failed to parse RSA public key")?,
        };

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = leeway_secs;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let key = config.load_public_key()?;
        Self::new(&config.algorithm, &key, config.leeway_secs)
    }
}

impl CredentialValidator for JwtCredentialValidator {
    fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<GatewayClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                debug!("Rejected bearer token: {}", e);
                AuthError::InvalidCredentials
            },
        )?;
        let claims = data.claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidCredentials)?;
        let role = RoleTier::from_claim(claims.role.as_deref())?;

        Ok(Identity {
            subject_id: claims.sub,
            role,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const PRIVATE_PEM: &str = include_str!("../../tests/fixtures/jwt_rs256.pem");
    const PUBLIC_PEM: &str = include_str!("../../tests/fixtures/jwt_rs256.pub.pem");
    const OTHER_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/other_rs256.pem");

    fn sign(private_pem: &str, claims: serde_json::Value) -> String {
        let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
    }

    fn exp(offset: i64) -> i64 {
        chrono::Utc::now().timestamp() + offset
    }

    fn validator() -> JwtCredentialValidator {
        JwtCredentialValidator::new("RS256", PUBLIC_PEM, 0).unwrap()
    }

    #[test]
    fn test_valid_token_yields_identity() {
        let token = sign(PRIVATE_PEM, json!({ "sub": "42", "exp": exp(3600), "role": "manager" }));
        let identity = validator().validate(&token).unwrap();
        assert_eq!(identity.subject_id, "42");
        assert_eq!(identity.role, RoleTier::Staff);
    }

    #[test]
    fn test_missing_role_is_common() {
        let token = sign(PRIVATE_PEM, json!({ "sub": "42", "exp": exp(3600) }));
        assert_eq!(validator().validate(&token).unwrap().role, RoleTier::Common);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let token = sign(PRIVATE_PEM, json!({ "sub": "42", "exp": exp(3600), "role": "root" }));
        assert_eq!(validator().validate(&token), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = sign(PRIVATE_PEM, json!({ "sub": "42", "exp": exp(-3600) }));
        assert_eq!(validator().validate(&token), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn test_leeway_accepts_recently_expired() {
        let token = sign(PRIVATE_PEM, json!({ "sub": "42", "exp": exp(-30) }));
        let lenient = JwtCredentialValidator::new("RS256", PUBLIC_PEM, 120).unwrap();
        assert!(lenient.validate(&token).is_ok());
    }

    #[test]
    fn test_wrong_signature_rejected() {
        let token = sign(OTHER_PRIVATE_PEM, json!({ "sub": "42", "exp": exp(3600) }));
        assert_eq!(validator().validate(&token), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn test_missing_subject_rejected() {
        let token = sign(PRIVATE_PEM, json!({ "exp": exp(3600) }));
        assert_eq!(validator().validate(&token), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(validator().validate("not-a-jwt"), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn test_shared_secret() {
        let key = EncodingKey::from_secret(b"local-dev-secret");
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "7", "exp": exp(60), "role": "admin" }),
            &key,
        )
        .unwrap();

        let validator = JwtCredentialValidator::new("HS256", "local-dev-secret", 0).unwrap();
        assert_eq!(validator.validate(&token).unwrap().role, RoleTier::Admin);
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let key = EncodingKey::from_secret(b"secret");
        let token = encode(&Header::new(Algorithm::HS256), &json!({ "sub": "7", "exp": exp(60) }), &key)
            .unwrap();
        assert_eq!(validator().validate(&token), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn test_bad_key_material_fails_construction() {
        assert!(JwtCredentialValidator::new("RS256", "not a pem", 0).is_err());
        assert!(JwtCredentialValidator::new("XX999", PUBLIC_PEM, 0).is_err());
    }
}
