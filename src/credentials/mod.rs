/// Credential Store
///
/// Lookup of user records by email or id, plus insertion on registration.
/// The auth layer only depends on the `CredentialStore` trait; Postgres and
/// in-memory implementations live alongside it.

mod memory;
mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::error::AppError;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// A stored user, including the password digest
#[derive(Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Lowercased
    pub email: String,
    pub password_digest: Vec<u8>,
    pub role: Role,
    pub phone: Option<String>,
    pub active: bool,
}

impl UserRecord {
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.first_name.clone(), self.role)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: format!("{} {}", self.first_name, self.last_name).trim().to_string(),
            email: self.email.clone(),
            role: self.role,
            active: self.active,
        }
    }
}

// Hand-written so the digest can never end up in a log line
impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password_digest", &"<redacted>")
            .field("role", &self.role)
            .field("phone", &self.phone)
            .field("active", &self.active)
            .finish()
    }
}

/// What the HTTP layer may show about a user
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

/// A user about to be inserted
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_digest: Vec<u8>,
    pub role: Role,
    pub phone: Option<String>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive lookup by email
    async fn lookup_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    async fn lookup_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError>;

    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if the email is taken
    async fn insert(&self, user: NewUser) -> Result<UserRecord, AppError>;
}
