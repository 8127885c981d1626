use std::net::TcpListener;
use std::sync::Arc;

use liveright::auth::Authenticator;
use liveright::configuration::get_configuration;
use liveright::credentials::PgCredentialStore;
use liveright::startup::run;
use liveright::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    // Connections are opened on first use
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(&configuration.database.connection_string())
        .map_err(|e| {
            tracing::error!("Invalid database configuration: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Database configuration error")
        })?;

    let authenticator = Authenticator::new(
        &configuration.jwt,
        &configuration.cookie,
        &configuration.password,
    )
    .map_err(|e| {
        tracing::error!("Failed to build authenticator: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Authentication configuration error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let store = Arc::new(PgCredentialStore::new(pool));
    let server = run(listener, store, authenticator)?;
    tracing::info!("Server started successfully");

    server.await
}
