use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::credentials::CredentialStore;
use crate::middleware::JwtMiddleware;
use crate::routes::{get_current_user, health_check, login, logout, refresh, register};

pub fn run(
    listener: TcpListener,
    store: Arc<dyn CredentialStore>,
    authenticator: Authenticator,
) -> Result<Server, std::io::Error> {
    let store: web::Data<dyn CredentialStore> = web::Data::from(store);
    let validator = authenticator.validator().clone();
    let authenticator = web::Data::new(authenticator);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())

            // Shared state
            .app_data(store.clone())
            .app_data(authenticator.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))

            // Protected routes (require a bearer access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(validator.clone()))
                    .route("/me", web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
