use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::server::ServerContext;
use crate::session::handle_connection;

/// Accepts TCP clients and spawns one session task per connection.
///
/// There is no cap on concurrent connections; every accepted socket gets
/// its own task for as long as the peer keeps it open.
pub struct Server {
    listener: TcpListener,
    context: Arc<ServerContext>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_context(Arc::new(ServerContext::new(config))).await
    }

    pub async fn with_context(context: Arc<ServerContext>) -> Result<Self, ServerError> {
        let addr = context.config.listen_socket();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server bound to {}", addr);

        if let Err(e) = context.store.ensure_root().await {
            warn!("Failed to create server root directory: {}", e);
        } else {
            info!("Server root directory: {}", context.store.root().display());
        }

        Ok(Self { listener, context })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Runs the accept loop forever. Accept errors are logged and skipped.
    pub async fn start(self) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Starting RAX room server on {}", addr),
            Err(_) => info!("Starting RAX room server"),
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New client connected: {}", addr);
                    let context = Arc::clone(&self.context);

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(handle_connection(stream, addr.to_string(), context));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
