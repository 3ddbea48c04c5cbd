//! Connection task
//!
//! Registers a connection, runs its protocol state machine, and removes it
//! from the registry exactly once however the session ends.

use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::framing::framed;
use crate::middleware::logging::log_connection;
use crate::protocol::ProtocolHandler;
use crate::server::ServerContext;

/// Serves one client stream until EXIT, end of stream, or a stream error.
pub async fn handle_connection<S>(stream: S, peer: String, context: Arc<ServerContext>)
where
    S: AsyncRead + AsyncWrite + Send + Sync + 'static,
{
    log_connection(&peer);

    let (reader, writer) = framed(stream, context.config.max_command_length);
    let id = context.registry.register(writer.clone(), &peer).await;

    let mut handler = ProtocolHandler::new(id, reader, writer.clone(), Arc::clone(&context));
    match handler.run().await {
        Ok(()) => info!("Connection {} ({}) finished", id, peer),
        Err(e) => warn!("Connection {} ({}) terminated: {}", id, peer, e),
    }

    context.registry.unregister(id).await;
    if let Err(e) = writer.shutdown().await {
        info!("Connection {} ({}) already closed: {}", id, peer, e);
    }
}
