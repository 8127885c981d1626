/// Refresh Cookie Management
///
/// The refresh token travels only in an `HttpOnly; Secure; SameSite=Strict`
/// cookie. The cookie's `Max-Age` is taken from the token's own expiry, so
/// the browser drops the cookie no later than the token stops validating.
/// The cookie value is never interpreted here; callers hand it to
/// `TokenValidator`.

use actix_web::cookie::{time::Duration, Cookie, CookieBuilder, SameSite};
use chrono::Utc;

use crate::auth::jwt::IssuedToken;
use crate::configuration::CookieSettings;
use crate::error::AuthError;

#[derive(Clone)]
pub struct RefreshCookieManager {
    name: String,
    path: String,
    domain: Option<String>,
}

impl RefreshCookieManager {
    pub fn new(config: &CookieSettings) -> Self {
        Self {
            name: config.name.clone(),
            path: config.path.clone(),
            domain: config.domain.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package a freshly issued refresh token
    pub fn wrap(&self, refresh: &IssuedToken) -> Cookie<'static> {
        self.wrap_at(refresh, Utc::now().timestamp())
    }

    /// Package a refresh token; `Max-Age` is its lifetime left at `now`
    pub fn wrap_at(&self, refresh: &IssuedToken, now: i64) -> Cookie<'static> {
        self.builder(refresh.token.clone())
            .max_age(Duration::seconds(refresh.remaining_at(now)))
            .finish()
    }

    /// A cookie instructing the browser to drop the session immediately
    pub fn clear(&self) -> Cookie<'static> {
        self.builder(String::new()).max_age(Duration::ZERO).finish()
    }

    /// Pull the refresh token out of the request's cookies
    ///
    /// # Errors
    /// `NoSessionCookie` when the cookie is absent or empty
    pub fn extract(&self, cookies: &[Cookie<'_>]) -> Result<String, AuthError> {
        cookies
            .iter()
            .find(|cookie| cookie.name() == self.name)
            .map(|cookie| cookie.value())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or(AuthError::NoSessionCookie)
    }

    fn builder(&self, value: String) -> CookieBuilder<'static> {
        let mut builder = Cookie::build(self.name.clone(), value)
            .path(self.path.clone())
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Strict);

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }

        builder
    }
}
