use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::{Server, ServerResult};

#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::init();

    let config = ServerConfig::parse();
    info!(
        "Starting match server on {} ({} Hz, {} sessions max, time scale {})",
        config.address(),
        config.tick_rate,
        config.max_clients,
        config.time_scale
    );

    let mut server = Server::new(&config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
