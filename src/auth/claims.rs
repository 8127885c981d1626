/// JWT Claims
///
/// Access and refresh payloads are distinct types joined by the tagged
/// `Claims` enum. The `token_type` tag is written by serde, so a refresh token
/// can only ever decode as `Claims::Refresh`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::identity::{Identity, Role};

/// Which half of a token pair a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Display name
    pub name: String,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    pub fn new(identity: &Identity, issued_at: i64, ttl_seconds: i64, iss: &str, aud: &str) -> Self {
        Self {
            sub: identity.subject_id,
            name: identity.display_name.clone(),
            role: identity.role,
            iss: iss.to_string(),
            aud: aud.to_string(),
            iat: issued_at,
            exp: issued_at + ttl_seconds,
        }
    }
}

/// Claims for refresh tokens. Carries no display name or role.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl RefreshClaims {
    pub fn new(subject_id: Uuid, issued_at: i64, ttl_seconds: i64, iss: &str, aud: &str) -> Self {
        Self {
            sub: subject_id,
            iss: iss.to_string(),
            aud: aud.to_string(),
            iat: issued_at,
            exp: issued_at + ttl_seconds,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "token_type", rename_all = "lowercase")]
pub enum Claims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

impl Claims {
    pub fn token_type(&self) -> TokenType {
        match self {
            Claims::Access(_) => TokenType::Access,
            Claims::Refresh(_) => TokenType::Refresh,
        }
    }

    pub fn subject(&self) -> Uuid {
        match self {
            Claims::Access(c) => c.sub,
            Claims::Refresh(c) => c.sub,
        }
    }

    pub fn issuer(&self) -> &str {
        match self {
            Claims::Access(c) => &c.iss,
            Claims::Refresh(c) => &c.iss,
        }
    }

    pub fn audience(&self) -> &str {
        match self {
            Claims::Access(c) => &c.aud,
            Claims::Refresh(c) => &c.aud,
        }
    }

    pub fn expires_at(&self) -> i64 {
        match self {
            Claims::Access(c) => c.exp,
            Claims::Refresh(c) => c.exp,
        }
    }
}

/// A claims payload that can be pulled out of `Claims` by type.
///
/// Lets callers write `validate_as::<RefreshClaims>(..)` and get the refresh
/// payload back without matching on `Claims` themselves.
pub trait TokenClaims: Sized {
    const TOKEN_TYPE: TokenType;

    fn from_claims(claims: Claims) -> Option<Self>;
}

impl TokenClaims for AccessClaims {
    const TOKEN_TYPE: TokenType = TokenType::Access;

    fn from_claims(claims: Claims) -> Option<Self> {
        match claims {
            Claims::Access(c) => Some(c),
            Claims::Refresh(_) => None,
        }
    }
}

impl TokenClaims for RefreshClaims {
    const TOKEN_TYPE: TokenType = TokenType::Refresh;

    fn from_claims(claims: Claims) -> Option<Self> {
        match claims {
            Claims::Refresh(c) => Some(c),
            Claims::Access(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new(Uuid::new_v4(), "Ada", Role::Patient)
    }

    #[test]
    fn test_access_claims_creation() {
        let identity = identity();
        let claims = AccessClaims::new(&identity, 1_000, 900, "liveright", "web");

        assert_eq!(claims.sub, identity.subject_id);
        assert_eq!(claims.name, "Ada");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_token_type_tag_is_serialized() {
        let claims = Claims::Refresh(RefreshClaims::new(Uuid::new_v4(), 1_000, 60, "i", "a"));
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["token_type"], "refresh");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_unknown_token_type_does_not_decode() {
        let json = serde_json::json!({
            "token_type": "session",
            "sub": Uuid::new_v4(),
            "iss": "i",
            "aud": "a",
            "iat": 0,
            "exp": 1
        });
        assert!(serde_json::from_value::<Claims>(json).is_err());
    }

    #[test]
    fn test_from_claims_respects_type() {
        let claims = Claims::Access(AccessClaims::new(&identity(), 0, 60, "i", "a"));
        assert!(RefreshClaims::from_claims(claims.clone()).is_none());
        assert!(AccessClaims::from_claims(claims).is_some());
    }
}
