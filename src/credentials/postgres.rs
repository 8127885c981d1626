use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{CredentialStore, NewUser, UserRecord};
use crate::auth::Role;
use crate::error::{AppError, DatabaseError};

const SELECT_USER: &str = r#"
    SELECT u.id, u.first_name, u.last_name, u.email, u.password_hash, r.name AS role, u.phone, u.active
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

/// Credential store backed by the `users` and `roles` tables
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: PgRow) -> Result<UserRecord, AppError> {
    let role: String = row.try_get("role")?;
    let role = role
        .parse::<Role>()
        .map_err(|e| AppError::Database(DatabaseError::UnexpectedError(e)))?;

    Ok(UserRecord {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get::<String, _>("email")?.to_lowercase(),
        password_digest: row.try_get("password_hash")?,
        role,
        phone: row.try_get("phone")?,
        active: row.try_get("active")?,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        // email is CITEXT; lower() keeps plain TEXT columns case-insensitive too
        let query = format!("{} WHERE lower(u.email) = lower($1)", SELECT_USER);

        sqlx::query(&query)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?
            .map(user_from_row)
            .transpose()
    }

    async fn lookup_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        let query = format!("{} WHERE u.id = $1", SELECT_USER);

        sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(user_from_row)
            .transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let email = user.email.trim().to_lowercase();

        let (id,) = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, role_id, phone, active)
            VALUES ($1, $2, $3, $4, $5, (SELECT id FROM roles WHERE name = $6), $7, true)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&email)
        .bind(&user.password_digest)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = %id, role = %user.role, "User inserted");

        Ok(UserRecord {
            id,
            first_name: user.first_name,
            last_name: user.last_name,
            email,
            password_digest: user.password_digest,
            role: user.role,
            phone: user.phone,
            active: true,
        })
    }
}
