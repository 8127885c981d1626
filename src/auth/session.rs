/// Session Protocol
///
/// Ties the pieces together:
///
/// ```text
/// Anonymous --login/register--> Authenticated(access, refresh)
/// Authenticated --renew--> Renewing --ok--> Authenticated(access', refresh')
///                                   --any failure--> Anonymous (cookie cleared)
/// Authenticated --logout--> Anonymous (cookie cleared)
/// ```
///
/// Nothing is stored server side between requests; every transition is
/// decided from the credential store, the token signature and the clock.

use actix_web::cookie::Cookie;
use uuid::Uuid;

use crate::auth::claims::RefreshClaims;
use crate::auth::cookie::RefreshCookieManager;
use crate::auth::identity::Role;
use crate::auth::jwt::{TokenIssuer, TokenPair, TokenValidator};
use crate::auth::password::{hash_password, verify_password};
use crate::configuration::{CookieSettings, JwtSettings, PasswordSettings};
use crate::credentials::{CredentialStore, NewUser, UserRecord};
use crate::error::{AppError, AuthError};

/// Plaintext verified against when the email is unknown, so both login
/// failures cost one full bcrypt run.
const DUMMY_PASSWORD: &str = "liveright-dummy-password";

/// An established session: tokens plus the cookie carrying the refresh half
#[derive(Debug)]
pub struct Session {
    pub tokens: TokenPair,
    pub cookie: Cookie<'static>,
}

/// Registration input, already shape-validated by the HTTP layer
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Session authentication service
///
/// Built once from configuration and shared read-only across workers.
#[derive(Clone)]
pub struct Authenticator {
    issuer: TokenIssuer,
    validator: TokenValidator,
    cookies: RefreshCookieManager,
    hash_cost: u32,
    dummy_digest: Vec<u8>,
}

impl Authenticator {
    /// # Errors
    /// `Config` if the settings break an invariant (e.g. refresh lifetime not
    /// longer than access lifetime)
    pub fn new(
        jwt: &JwtSettings,
        cookie: &CookieSettings,
        password: &PasswordSettings,
    ) -> Result<Self, AppError> {
        jwt.validate()?;
        cookie.validate()?;
        password.validate()?;

        let dummy_digest = bcrypt::hash(DUMMY_PASSWORD, password.hash_cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .into_bytes();

        Ok(Self {
            issuer: TokenIssuer::new(jwt),
            validator: TokenValidator::new(jwt),
            cookies: RefreshCookieManager::new(cookie),
            hash_cost: password.hash_cost,
            dummy_digest,
        })
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    pub fn cookies(&self) -> &RefreshCookieManager {
        &self.cookies
    }

    /// Anonymous -> Authenticated
    ///
    /// # Errors
    /// - `InvalidCredentials` for an unknown email or a wrong password alike
    /// - `CorruptDigest` if the stored digest cannot be read
    /// - `SigningFailure` if tokens cannot be signed
    pub async fn login(
        &self,
        store: &dyn CredentialStore,
        email: &str,
        password: &str,
    ) -> Result<(UserRecord, Session), AppError> {
        let user = store.lookup_by_email(email).await?;

        let digest = match &user {
            Some(user) => user.password_digest.clone(),
            None => self.dummy_digest.clone(),
        };
        let password = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&password, &digest)).await??;

        let user = match user {
            Some(user) if matches => user,
            Some(user) => {
                tracing::info!(user_id = %user.id, "Password mismatch");
                return Err(AuthError::InvalidCredentials.into());
            }
            None => {
                tracing::info!("Login attempt for unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let session = self.establish(&user)?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok((user, session))
    }

    /// Create a patient account and log it in
    ///
    /// # Errors
    /// Validation errors for a weak password, `UniqueConstraintViolation` for
    /// a taken email
    pub async fn register(
        &self,
        store: &dyn CredentialStore,
        registration: Registration,
    ) -> Result<(UserRecord, Session), AppError> {
        let cost = self.hash_cost;
        let password = registration.password;
        let password_digest =
            tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??;

        let user = store
            .insert(NewUser {
                first_name: registration.first_name,
                last_name: registration.last_name,
                email: registration.email,
                password_digest,
                role: Role::Patient,
                phone: registration.phone,
            })
            .await?;

        let session = self.establish(&user)?;
        tracing::info!(user_id = %user.id, "User registered");

        Ok((user, session))
    }

    /// Authenticated -> Renewing -> Authenticated
    ///
    /// On error the caller must move the client back to Anonymous, see
    /// `clears_session`.
    pub async fn renew(
        &self,
        store: &dyn CredentialStore,
        cookies: &[Cookie<'_>],
    ) -> Result<Session, AppError> {
        let refresh_token = self.cookies.extract(cookies)?;
        let claims: RefreshClaims = self.validator.validate_as(&refresh_token)?;

        let user = self.current_user(store, claims.sub).await?;
        let session = self.establish(&user)?;

        tracing::info!(user_id = %user.id, "Session renewed");
        Ok(session)
    }

    /// Authenticated -> Anonymous. Idempotent.
    pub fn logout(&self) -> Cookie<'static> {
        self.cookies.clear()
    }

    /// Whether a failed renewal must clear the client's cookie.
    ///
    /// Only a rejected refresh token does. A missing cookie has nothing to
    /// clear, and store or signing failures leave a still-valid cookie in
    /// place so the client can retry.
    pub fn clears_session(error: &AppError) -> bool {
        matches!(error.auth_error(), Some(e) if e.is_token_failure())
    }

    async fn current_user(&self, store: &dyn CredentialStore, id: Uuid) -> Result<UserRecord, AppError> {
        store.lookup_by_id(id).await?.ok_or_else(|| {
            tracing::warn!(user_id = %id, "Refresh token for unknown user");
            AuthError::UnknownSubject.into()
        })
    }

    fn establish(&self, user: &UserRecord) -> Result<Session, AppError> {
        let tokens = self.issuer.issue(&user.identity())?;
        let cookie = self.cookies.wrap(&tokens.refresh);
        Ok(Session { tokens, cookie })
    }
}
