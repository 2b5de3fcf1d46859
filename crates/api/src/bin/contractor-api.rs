//! Data contract coordination service — HTTP API entrypoint.

use contractor_api::{telemetry, ApiConfig, Server, ServerConfig};
use contractor_store::Database;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    telemetry::init();

    let config = match ApiConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    info!("starting contractor-api");

    let db = match Database::new(&config.store).await {
        Ok(db) => db,
        Err(e) => {
            error!("failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = db.migrate().await {
        error!("failed to run migrations: {e}");
        std::process::exit(1);
    }

    let server_config = ServerConfig {
        host: config.host,
        port: config.port,
        enable_cors: config.enable_cors,
    };

    let server = Server::new(server_config, db.pool().clone());

    if let Err(e) = server.start().await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}
