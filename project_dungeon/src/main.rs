mod shutdown;

use project_dungeon::config::parse_cli_args;
use project_dungeon::Server;

#[tokio::main]
async fn main() {
    observability::init_logging();

    let config = parse_cli_args();
    tracing::info!("Dungeon server starting...");

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = net::shutdown_channel();
    let mut server_task = tokio::spawn(server.run(shutdown_rx));

    tokio::select! {
        _ = shutdown::wait_for_signal() => {
            tracing::info!("Shutdown signal received, stopping server...");
            shutdown_tx.trigger();
            if let Err(e) = server_task.await {
                tracing::error!("Server task failed: {}", e);
            }
        }
        joined = &mut server_task => {
            if let Err(e) = joined {
                tracing::error!("Server task failed: {}", e);
            }
        }
    }

    tracing::info!("Server stopped.");
}
