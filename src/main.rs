//! RAX Room Server - Entry Point
//!
//! Chat broadcast and file transfer multiplexed over one TCP session per client.

use log::info;
use std::process::ExitCode;

use rax_room_server::error::ServerError;
use rax_room_server::error::handlers::handle_error;
use rax_room_server::utils::logging::setup_logging;
use rax_room_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    info!("Launching room server...");

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            handle_error(&ServerError::from(e));
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            handle_error(&e);
            return ExitCode::FAILURE;
        }
    };

    server.start().await;
    ExitCode::SUCCESS
}
