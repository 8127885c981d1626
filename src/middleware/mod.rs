/// Middleware module
///
/// Bearer-token protection for `/api` routes.

mod jwt_middleware;

pub use jwt_middleware::JwtMiddleware;
