/// Authentication module
///
/// Password verification, JWT access/refresh token issuance and validation,
/// the refresh cookie, and the login/renew/logout protocol built on them.

mod claims;
mod cookie;
mod identity;
mod jwt;
mod password;
mod session;

pub use claims::{AccessClaims, Claims, RefreshClaims, TokenClaims, TokenType};
pub use cookie::RefreshCookieManager;
pub use identity::{Identity, Role};
pub use jwt::{IssuedToken, TokenIssuer, TokenPair, TokenValidator};
pub use password::{hash_password, verify_password};
pub use session::{Authenticator, Registration, Session};
