/// Authentication Routes
///
/// Registration, login, silent renewal, logout and current user information.
/// The refresh token only ever leaves the server in the `Set-Cookie` header;
/// response bodies carry the access token and refresh metadata.

use actix_web::cookie::Cookie;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};

use crate::auth::{AccessClaims, Authenticator, IssuedToken, Registration, Session};
use crate::credentials::{CredentialStore, UserSummary};
use crate::error::{AppError, ErrorContext};
use crate::validators::{is_valid_email, is_valid_name, is_valid_phone};

/// User registration request
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// User login request
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Where the refresh token went and how long it lasts; never the token itself
#[derive(Serialize)]
pub struct RefreshTokenMetadata {
    pub cookie: String,
    pub expires_in: i64,
    pub expires_at: i64,
}

/// Token response body
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token_metadata: RefreshTokenMetadata,
}

/// Login and registration response
#[derive(Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenResponse,
    pub user: UserSummary,
}

/// Current user response, straight from the access token
#[derive(Serialize)]
pub struct MeResponse {
    pub id: String,
    pub name: String,
    pub role: String,
}

fn token_response(auth: &Authenticator, session: &Session) -> TokenResponse {
    let access: &IssuedToken = &session.tokens.access;
    let refresh: &IssuedToken = &session.tokens.refresh;

    TokenResponse {
        access_token: access.token.clone(),
        token_type: "Bearer",
        expires_in: auth.issuer().access_ttl(),
        refresh_token_metadata: RefreshTokenMetadata {
            cookie: auth.cookies().name().to_string(),
            expires_in: auth.issuer().refresh_ttl(),
            expires_at: refresh.expires_at,
        },
    }
}

/// POST /auth/register
///
/// Create a patient account and start a session.
///
/// # Errors
/// - 400: Validation errors (invalid email/password/name)
/// - 409: Email already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    store: web::Data<dyn CredentialStore>,
    auth: web::Data<Authenticator>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let form = form.into_inner();

    let registration = Registration {
        first_name: is_valid_name("first_name", &form.first_name)?,
        last_name: is_valid_name("last_name", &form.last_name)?,
        email: is_valid_email(&form.email)?,
        password: form.password,
        phone: is_valid_phone(form.phone.as_deref())?,
    };

    let (user, session) = auth
        .register(store.get_ref(), registration)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(request_id = %context.request_id, user_id = %user.id, "Registration complete");

    Ok(HttpResponse::Created()
        .cookie(session.cookie.clone())
        .json(AuthResponse {
            tokens: token_response(&auth, &session),
            user: user.summary(),
        }))
}

/// POST /auth/login
///
/// Verify email and password and start a session.
///
/// # Errors
/// - 401: Invalid credentials. Same body for an unknown email and a wrong
///   password.
/// - 500: Corrupt stored digest or signing failure
pub async fn login(
    form: web::Json<LoginRequest>,
    store: web::Data<dyn CredentialStore>,
    auth: web::Data<Authenticator>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let (user, session) = auth
        .login(store.get_ref(), &form.email, &form.password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    let context = context.with_user_id(user.id.to_string());
    tracing::info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        "Login complete"
    );

    Ok(HttpResponse::Ok()
        .cookie(session.cookie.clone())
        .json(AuthResponse {
            tokens: token_response(&auth, &session),
            user: user.summary(),
        }))
}

/// POST /auth/refresh
///
/// Exchange the refresh cookie for a new access token and a rotated cookie.
/// No body.
///
/// # Errors
/// - 401 `NOT_LOGGED_IN`: no session cookie; the cookie is left untouched
/// - 401 `TOKEN_EXPIRED` / `TOKEN_INVALID`: the cookie is cleared and the
///   client must log in again
/// - 5xx: store or signing failure; the cookie is kept so the client can retry
pub async fn refresh(
    req: HttpRequest,
    store: web::Data<dyn CredentialStore>,
    auth: web::Data<Authenticator>,
) -> HttpResponse {
    let context = ErrorContext::new("token_refresh");

    let cookies: Vec<Cookie<'static>> = match req.cookies() {
        Ok(cookies) => cookies.clone(),
        Err(e) => {
            tracing::debug!(request_id = %context.request_id, error = %e, "Unparseable Cookie header");
            Vec::new()
        }
    };

    match auth.renew(store.get_ref(), &cookies).await {
        Ok(session) => {
            tracing::info!(request_id = %context.request_id, "Session renewed");
            HttpResponse::Ok()
                .cookie(session.cookie.clone())
                .json(token_response(&auth, &session))
        }
        Err(e) => {
            context.log_error(&e);
            let mut response = e.error_response();
            if Authenticator::clears_session(&e) {
                if let Err(cookie_err) = response.add_cookie(&auth.logout()) {
                    tracing::error!(error = %cookie_err, "Failed to attach clearing cookie");
                }
            }
            response
        }
    }
}

/// POST /auth/logout
///
/// Clear the session cookie. Always succeeds, with or without a session.
pub async fn logout(auth: web::Data<Authenticator>) -> HttpResponse {
    HttpResponse::NoContent().cookie(auth.logout()).finish()
}

/// GET /api/me
///
/// **Requires valid JWT access token** in the Authorization header; claims are
/// injected by `JwtMiddleware`.
pub async fn get_current_user(claims: web::ReqData<AccessClaims>) -> HttpResponse {
    let claims = claims.into_inner();

    HttpResponse::Ok().json(MeResponse {
        id: claims.sub.to_string(),
        name: claims.name,
        role: claims.role.to_string(),
    })
}
