use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use spendwise::configuration::{get_configuration, StorageBackend};
use spendwise::startup::run;
use spendwise::store::{ExpenseStore, MemoryStore, PgStore, UserStore};
use spendwise::telemetry::init_telemetry;

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

    let (users, expenses): (Arc<dyn UserStore>, Arc<dyn ExpenseStore>) =
        match configuration.application.storage {
            StorageBackend::Postgres => {
                tracing::info!("Attempting to connect to database");
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&configuration.database.connection_string())
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to create connection pool: {}", e);
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionRefused,
                            "Database connection error",
                        )
                    })?;

                let store = Arc::new(PgStore::new(pool));
                store.migrate().await.map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
                })?;
                tracing::info!("Database ready");
                (store.clone() as Arc<dyn UserStore>, store as Arc<dyn ExpenseStore>)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on exit");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn UserStore>, store as Arc<dyn ExpenseStore>)
            }
        };

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, configuration, users, expenses)?;
    server.await
}
