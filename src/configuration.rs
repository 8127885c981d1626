use crate::error::ConfigError;

/// Cookie names with this prefix are only accepted by browsers when they
/// carry `Secure`, `Path=/` and no `Domain` attribute.
pub const HOST_COOKIE_PREFIX: &str = "__Host-";

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub cookie: CookieSettings,
    #[serde(default)]
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// JWT signing settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 86400 for 24 hours)
    pub issuer: String,
    pub audience: String,
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if self.issuer.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.issuer".to_string()));
        }
        if self.audience.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.audience".to_string()));
        }
        if self.access_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expiry must be positive".to_string(),
            ));
        }
        // A refresh token has to survive at least one access token cycle
        if self.refresh_token_expiry <= self.access_token_expiry {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expiry must exceed jwt.access_token_expiry".to_string(),
            ));
        }
        Ok(())
    }
}

/// Refresh cookie attributes. Lifetime is not configurable here: it always
/// follows the refresh token's own expiry.
#[derive(serde::Deserialize, Clone)]
pub struct CookieSettings {
    pub name: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl CookieSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingRequired("cookie.name".to_string()));
        }
        if self.path.is_empty() {
            return Err(ConfigError::MissingRequired("cookie.path".to_string()));
        }
        if self.name.starts_with(HOST_COOKIE_PREFIX) {
            if self.domain.is_some() {
                return Err(ConfigError::InvalidValue(format!(
                    "cookie.domain must be unset for {}* cookie names",
                    HOST_COOKIE_PREFIX
                )));
            }
            if self.path != "/" {
                return Err(ConfigError::InvalidValue(format!(
                    "cookie.path must be \"/\" for {}* cookie names",
                    HOST_COOKIE_PREFIX
                )));
            }
        }
        Ok(())
    }
}

/// Password hashing settings
#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    pub hash_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "password.hash_cost must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }
        Ok(())
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate()?;
        self.cookie.validate()?;
        self.password.validate()
    }
}

/// Load settings from `configuration.{yaml,toml,json}` in the working
/// directory, overridden by `APP_<SECTION>__<KEY>` environment variables
/// (e.g. `APP_JWT__SECRET`).
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 86400,
            issuer: "liveright".to_string(),
            audience: "liveright-web".to_string(),
        }
    }

    #[test]
    fn test_valid_jwt_settings() {
        assert!(jwt().validate().is_ok());
    }

    #[test]
    fn test_refresh_must_outlive_access() {
        let mut config = jwt();
        config.refresh_token_expiry = config.access_token_expiry;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let mut config = jwt();
        config.secret.clear();
        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired(_))));
    }

    #[test]
    fn test_host_prefixed_cookie_rejects_domain() {
        let cookie = CookieSettings {
            name: "__Host-refresh_token".to_string(),
            path: "/".to_string(),
            domain: Some("liveright.example".to_string()),
        };
        assert!(cookie.validate().is_err());

        let cookie = CookieSettings {
            domain: None,
            ..cookie
        };
        assert!(cookie.validate().is_ok());
    }

    #[test]
    fn test_plain_cookie_accepts_domain() {
        let cookie = CookieSettings {
            name: "refresh_token".to_string(),
            path: "/auth".to_string(),
            domain: Some("liveright.example".to_string()),
        };
        assert!(cookie.validate().is_ok());
    }

    #[test]
    fn test_hash_cost_bounds() {
        assert!(PasswordSettings { hash_cost: 3 }.validate().is_err());
        assert!(PasswordSettings { hash_cost: 4 }.validate().is_ok());
        assert!(PasswordSettings::default().validate().is_ok());
    }
}
