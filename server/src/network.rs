//! TCP listener that hands each accepted connection to its own handler task

use crate::config::{GameConfig, ServerConfig};
use crate::connection::handle_connection;
use crate::registry::{SessionRegistry, SharedRegistry};
use crate::session::ConnectionId;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Main server accepting peers and sharing one session registry between them
pub struct Server {
    listener: TcpListener,
    registry: SharedRegistry,
    config: Arc<GameConfig>,
    next_connection_id: ConnectionId,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let address = config.address();
        let listener = TcpListener::bind(&address).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            registry: SessionRegistry::shared(config.game.countdown_from),
            config: Arc::new(config.game),
            next_connection_id: 1,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Accepts connections until the task is cancelled.
    ///
    /// A failed accept is logged and retried; it never takes down sessions
    /// that are already running.
    pub async fn run(mut self) {
        info!(
            "Server started: {} Hz, first to {}, countdown from {}",
            self.config.tick_rate, self.config.win_score, self.config.countdown_from
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let id = self.next_connection_id;
                    self.next_connection_id += 1;

                    tokio::spawn(handle_connection(
                        stream,
                        addr,
                        id,
                        Arc::clone(&self.registry),
                        Arc::clone(&self.config),
                    ));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}
