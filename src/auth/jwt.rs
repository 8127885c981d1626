/// JWT Token Issuance and Validation
///
/// Both halves of a session are HS256 JWTs signed with the same secret. The
/// issuer reads the clock on every call; the validator checks, in order,
/// structure, signature, expiry, issuer/audience and token type.

use std::collections::HashSet;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;

use crate::auth::claims::{AccessClaims, Claims, RefreshClaims, TokenClaims, TokenType};
use crate::auth::identity::Identity;
use crate::configuration::JwtSettings;
use crate::error::AuthError;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// A signed token together with the lifetime baked into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    /// Unix timestamp
    pub issued_at: i64,
    /// Unix timestamp
    pub expires_at: i64,
}

impl IssuedToken {
    /// Seconds left before expiry, as seen at `now`. Never negative.
    pub fn remaining_at(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Signs access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    secret_configured: bool,
    access_ttl: i64,
    refresh_ttl: i64,
    issuer: String,
    audience: String,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            key: EncodingKey::from_secret(config.secret.as_bytes()),
            secret_configured: !config.secret.is_empty(),
            access_ttl: config.access_token_expiry,
            refresh_ttl: config.refresh_token_expiry,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    pub fn access_ttl(&self) -> i64 {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> i64 {
        self.refresh_ttl
    }

    /// Issue a fresh token pair for a verified identity
    ///
    /// # Errors
    /// `SigningFailure` if either token cannot be signed
    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, AuthError> {
        self.issue_at(identity, Utc::now().timestamp())
    }

    /// Issue a token pair as if the current time were `now` (Unix seconds)
    pub fn issue_at(&self, identity: &Identity, now: i64) -> Result<TokenPair, AuthError> {
        let access = AccessClaims::new(identity, now, self.access_ttl, &self.issuer, &self.audience);
        let refresh = RefreshClaims::new(
            identity.subject_id,
            now,
            self.refresh_ttl,
            &self.issuer,
            &self.audience,
        );

        let pair = TokenPair {
            access: IssuedToken {
                issued_at: access.iat,
                expires_at: access.exp,
                token: self.sign(&Claims::Access(access))?,
            },
            refresh: IssuedToken {
                issued_at: refresh.iat,
                expires_at: refresh.exp,
                token: self.sign(&Claims::Refresh(refresh))?,
            },
        };

        tracing::debug!(
            user_id = %identity.subject_id,
            access_expires_at = pair.access.expires_at,
            refresh_expires_at = pair.refresh.expires_at,
            "Issued token pair"
        );

        Ok(pair)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        // An empty HMAC key would still "sign"; refuse it instead
        if !self.secret_configured {
            tracing::error!("JWT secret is not configured");
            return Err(AuthError::SigningFailure);
        }

        encode(&Header::new(ALGORITHM), claims, &self.key).map_err(|e| {
            tracing::error!(error = %e, "Token signing failed");
            AuthError::SigningFailure
        })
    }
}

/// Verifies tokens produced by `TokenIssuer`
///
/// Pure with respect to its inputs: no store lookups, no side effects beyond
/// debug logging.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    /// Shape only: header, payload base64 and the `Claims` JSON
    structure: Validation,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl TokenValidator {
    pub fn new(config: &JwtSettings) -> Self {
        // Only the signature and algorithm are left to jsonwebtoken; expiry,
        // issuer and audience are checked below so each gets its own error.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        // jsonwebtoken verifies the signature before it decodes the payload,
        // so a garbled payload under a bad signature would otherwise surface
        // as `BadSignature`. The unsigned pass runs first to keep `Malformed`
        // ahead of it.
        let mut structure = validation.clone();
        structure.insecure_disable_signature_validation();

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            structure,
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    /// Validate a token expecting the given type
    pub fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        self.validate_at(token, expected, Utc::now().timestamp())
    }

    /// Validate a token against the clock value `now` (Unix seconds)
    pub fn validate_at(&self, token: &str, expected: TokenType, now: i64) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.structure).map_err(|e| {
            tracing::debug!(error = %e, "JWT is not well formed");
            AuthError::Malformed
        })?;

        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let kind = match e.kind() {
                    ErrorKind::InvalidSignature
                    | ErrorKind::InvalidAlgorithm
                    | ErrorKind::MissingAlgorithm => AuthError::BadSignature,
                    _ => AuthError::Malformed,
                };
                tracing::debug!(error = %e, ?kind, "JWT rejected");
                kind
            })?;

        if claims.expires_at() <= now {
            return Err(AuthError::Expired);
        }

        if claims.issuer() != self.issuer || claims.audience() != self.audience {
            tracing::warn!(
                user_id = %claims.subject(),
                issuer = claims.issuer(),
                audience = claims.audience(),
                "JWT issued for another issuer or audience"
            );
            return Err(AuthError::WrongAudience);
        }

        if claims.token_type() != expected {
            tracing::warn!(
                user_id = %claims.subject(),
                expected = ?expected,
                actual = ?claims.token_type(),
                "JWT presented as the wrong token type"
            );
            return Err(AuthError::WrongTokenType);
        }

        Ok(claims)
    }

    /// Validate and return the typed payload, e.g. `validate_as::<RefreshClaims>`
    pub fn validate_as<T: TokenClaims>(&self, token: &str) -> Result<T, AuthError> {
        self.validate_as_at(token, Utc::now().timestamp())
    }

    pub fn validate_as_at<T: TokenClaims>(&self, token: &str, now: i64) -> Result<T, AuthError> {
        let claims = self.validate_at(token, T::TOKEN_TYPE, now)?;
        T::from_claims(claims).ok_or(AuthError::WrongTokenType)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::Role;
    use uuid::Uuid;

    const NOW: i64 = 1_700_000_000;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 86400,
            issuer: "liveright".to_string(),
            audience: "liveright-web".to_string(),
        }
    }

    fn identity() -> Identity {
        Identity::new(Uuid::new_v4(), "Ada", Role::Doctor)
    }

    fn pair() -> (Identity, TokenPair) {
        let identity = identity();
        let pair = TokenIssuer::new(&get_test_config())
            .issue_at(&identity, NOW)
            .expect("Failed to issue tokens");
        (identity, pair)
    }

    #[test]
    fn test_issue_and_validate_access_token() {
        let (identity, pair) = pair();
        let validator = TokenValidator::new(&get_test_config());

        let claims: AccessClaims = validator
            .validate_as_at(&pair.access.token, NOW)
            .expect("Failed to validate token");

        assert_eq!(claims.sub, identity.subject_id);
        assert_eq!(claims.name, "Ada");
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.iss, "liveright");
        assert_eq!(claims.aud, "liveright-web");
    }

    #[test]
    fn test_lifetimes_match_configuration() {
        let issuer = TokenIssuer::new(&get_test_config());
        let pair = issuer.issue_at(&identity(), NOW).unwrap();

        assert_eq!(issuer.access_ttl(), 900);
        assert_eq!(issuer.refresh_ttl(), 86400);
        assert_eq!(pair.access.expires_at - pair.access.issued_at, issuer.access_ttl());
        assert_eq!(pair.refresh.expires_at - pair.refresh.issued_at, issuer.refresh_ttl());
    }

    #[test]
    fn test_refresh_token_omits_display_name() {
        let (identity, pair) = pair();
        let claims: RefreshClaims = TokenValidator::new(&get_test_config())
            .validate_as_at(&pair.refresh.token, NOW)
            .unwrap();
        assert_eq!(claims.sub, identity.subject_id);

        let validator = TokenValidator::new(&get_test_config());
        let raw = decode::<serde_json::Value>(&pair.refresh.token, &validator.key, &validator.validation)
            .unwrap()
            .claims;
        assert_eq!(raw["token_type"], "refresh");
        assert!(raw.get("name").is_none());
        assert!(raw.get("role").is_none());
    }

    #[test]
    fn test_issue_reads_clock_each_time() {
        let issuer = TokenIssuer::new(&get_test_config());
        let identity = identity();

        let first = issuer.issue_at(&identity, NOW).unwrap();
        let second = issuer.issue_at(&identity, NOW + 1).unwrap();

        assert_ne!(first.access.token, second.access.token);
        assert_eq!(second.access.issued_at, first.access.issued_at + 1);
    }

    #[test]
    fn test_access_expires_while_refresh_survives() {
        let (_, pair) = pair();
        let validator = TokenValidator::new(&get_test_config());
        let later = NOW + 900;

        assert_eq!(
            validator.validate_at(&pair.access.token, TokenType::Access, later),
            Err(AuthError::Expired)
        );
        assert!(validator
            .validate_at(&pair.refresh.token, TokenType::Refresh, later)
            .is_ok());
    }

    #[test]
    fn test_refresh_expires() {
        let (_, pair) = pair();
        let validator = TokenValidator::new(&get_test_config());

        assert_eq!(
            validator.validate_at(&pair.refresh.token, TokenType::Refresh, NOW + 86400),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let (_, pair) = pair();
        let validator = TokenValidator::new(&get_test_config());

        assert_eq!(
            validator.validate_at(&pair.refresh.token, TokenType::Access, NOW),
            Err(AuthError::WrongTokenType)
        );
        assert_eq!(
            validator.validate_at(&pair.access.token, TokenType::Refresh, NOW),
            Err(AuthError::WrongTokenType)
        );
        assert_eq!(
            validator.validate_as_at::<AccessClaims>(&pair.refresh.token, NOW),
            Err(AuthError::WrongTokenType)
        );
    }

    #[test]
    fn test_malformed_token() {
        let validator = TokenValidator::new(&get_test_config());

        for token in ["", "invalid", "invalid.token.here", "a.b"] {
            assert_eq!(
                validator.validate_at(token, TokenType::Access, NOW),
                Err(AuthError::Malformed),
                "token {:?}",
                token
            );
        }
    }

    #[test]
    fn test_tampered_token() {
        let (_, pair) = pair();
        let validator = TokenValidator::new(&get_test_config());

        // Swap the signature for the refresh token's
        let mut parts: Vec<&str> = pair.access.token.split('.').collect();
        let refresh_signature = pair.refresh.token.rsplit('.').next().unwrap();
        parts[2] = refresh_signature;
        let tampered = parts.join(".");

        assert_eq!(
            validator.validate_at(&tampered, TokenType::Access, NOW),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_garbled_payload_is_malformed_even_with_bad_signature() {
        let (_, pair) = pair();
        let validator = TokenValidator::new(&get_test_config());

        let header = pair.access.token.split('.').next().unwrap();
        let refresh_signature = pair.refresh.token.rsplit('.').next().unwrap();

        for payload in ["not*base64!", "bm90IGpzb24"] {
            let token = format!("{}.{}.{}", header, payload, refresh_signature);
            assert_eq!(
                validator.validate_at(&token, TokenType::Access, NOW),
                Err(AuthError::Malformed),
                "payload {:?}",
                payload
            );
        }
    }

    #[test]
    fn test_wrong_secret() {
        let (_, pair) = pair();
        let mut config = get_test_config();
        config.secret = "another-secret-key-at-least-32-characters".to_string();

        assert_eq!(
            TokenValidator::new(&config).validate_at(&pair.access.token, TokenType::Access, NOW),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_bad_signature_wins_over_expiry() {
        let (_, pair) = pair();
        let mut config = get_test_config();
        config.secret = "another-secret-key-at-least-32-characters".to_string();

        assert_eq!(
            TokenValidator::new(&config).validate_at(
                &pair.access.token,
                TokenType::Access,
                NOW + 10_000
            ),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_wrong_issuer() {
        let (_, pair) = pair();
        let mut config = get_test_config();
        config.issuer = "wrong-issuer".to_string();

        assert_eq!(
            TokenValidator::new(&config).validate_at(&pair.access.token, TokenType::Access, NOW),
            Err(AuthError::WrongAudience)
        );
    }

    #[test]
    fn test_wrong_audience() {
        let (_, pair) = pair();
        let mut config = get_test_config();
        config.audience = "mobile".to_string();

        assert_eq!(
            TokenValidator::new(&config).validate_at(&pair.refresh.token, TokenType::Refresh, NOW),
            Err(AuthError::WrongAudience)
        );
    }

    #[test]
    fn test_expiry_checked_before_audience() {
        let (_, pair) = pair();
        let mut config = get_test_config();
        config.audience = "mobile".to_string();

        assert_eq!(
            TokenValidator::new(&config).validate_at(&pair.access.token, TokenType::Refresh, NOW + 900),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let config = get_test_config();
        let claims = Claims::Access(AccessClaims::new(&identity(), NOW, 900, &config.issuer, &config.audience));
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            TokenValidator::new(&config).validate_at(&token, TokenType::Access, NOW),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_empty_secret_is_a_signing_failure() {
        let mut config = get_test_config();
        config.secret.clear();

        assert_eq!(
            TokenIssuer::new(&config).issue(&identity()),
            Err(AuthError::SigningFailure)
        );
    }

    #[test]
    fn test_issue_uses_wall_clock() {
        let config = get_test_config();
        let pair = TokenIssuer::new(&config).issue(&identity()).unwrap();

        assert!(TokenValidator::new(&config)
            .validate(&pair.access.token, TokenType::Access)
            .is_ok());
    }

    #[test]
    fn test_remaining_lifetime_never_negative() {
        let (_, pair) = pair();
        assert_eq!(pair.refresh.remaining_at(NOW), 86400);
        assert_eq!(pair.refresh.remaining_at(NOW + 100_000), 0);
    }
}
