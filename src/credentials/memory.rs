use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::{CredentialStore, NewUser, UserRecord};
use crate::error::{AppError, DatabaseError};

/// Process-local credential store keyed by lowercased email
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> AppError {
        AppError::Internal("credential store lock poisoned".to_string())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.get(&email.trim().to_lowercase()).cloned())
    }

    async fn lookup_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.values().find(|user| user.id == id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let email = user.email.trim().to_lowercase();
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;

        if users.contains_key(&email) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            )
            .into());
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: email.clone(),
            password_digest: user.password_digest,
            role: user.role,
            phone: user.phone,
            active: true,
        };
        users.insert(email, record.clone());

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "Ada".to_string(),
            last_name: "Obi".to_string(),
            email: email.to_string(),
            password_digest: b"digest".to_vec(),
            role: Role::Patient,
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let store = InMemoryCredentialStore::new();
        let inserted = store.insert(new_user("Ada@LiveRight.example")).await.unwrap();

        assert_eq!(inserted.email, "ada@liveright.example");
        let found = store.lookup_by_email("ADA@liveright.EXAMPLE").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(inserted.id));
    }

    #[tokio::test]
    async fn test_lookup_by_id() {
        let store = InMemoryCredentialStore::new();
        let inserted = store.insert(new_user("ada@liveright.example")).await.unwrap();

        assert!(store.lookup_by_id(inserted.id).await.unwrap().is_some());
        assert!(store.lookup_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryCredentialStore::new();
        store.insert(new_user("ada@liveright.example")).await.unwrap();

        let result = store.insert(new_user("ADA@liveright.example")).await;
        assert!(matches!(
            result,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));
    }
}
