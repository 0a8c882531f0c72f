//! Chat server bootstrap
//!
//! Binds the listener, starts the registry actor and spawns one connection
//! handler task per accepted socket.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::registry::RegistryHandle;

/// A bound chat server
pub struct Server {
    listener: TcpListener,
    registry: RegistryHandle,
    max_line_length: usize,
}

impl Server {
    /// Bind the listener and start the registry
    ///
    /// A bind failure is fatal and returned to the caller.
    pub async fn bind(config: &ServerConfig) -> Result<Self, AppError> {
        let listener = TcpListener::bind(config.listen).await?;
        let registry = RegistryHandle::spawn(config.protocol.codec());

        Ok(Self {
            listener,
            registry,
            max_line_length: config.max_line_length,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            registry,
            max_line_length,
        } = self;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("New connection from {}", addr);
                        let registry = registry.clone();

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, registry, max_line_length).await {
                                error!("Connection handler error for {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }

    /// Accept connections until Ctrl-C
    pub async fn run_until_ctrl_c(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install ctrl-c handler: {}", e);
            }
        })
        .await
    }
}
