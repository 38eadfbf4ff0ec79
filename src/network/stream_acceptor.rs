use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::error_handling::types::NetworkError;

/// Accepts the capture process's single output connection per session.
///
/// The listener is bound once per outer supervisor iteration and shared by
/// every session within it; each session performs exactly one fresh accept
/// handshake, so a mode switch always attaches to the new process's
/// connection and never to a stale one. Delivery is a one-shot channel: the
/// accept runs on its own task while the supervisor launches the process,
/// then the supervisor blocks on the receiver.
pub struct StreamAcceptor {
    listener: Arc<TcpListener>,
}

impl StreamAcceptor {
    /// Binds the local stream endpoint.
    pub async fn bind(port: u16) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(NetworkError::BindError)?;
        debug!("stream listener bound on {:?}", listener.local_addr());
        Ok(Self {
            listener: Arc::new(listener),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.listener.local_addr().map_err(NetworkError::BindError)
    }

    /// Spawns the accept-and-deliver handshake for one capture session.
    ///
    /// The returned receiver resolves with the first accepted connection. A
    /// dropped sender (accept error) surfaces to the awaiting supervisor as
    /// a failed handoff.
    pub fn accept_one(&self) -> oneshot::Receiver<TcpStream> {
        let (tx, rx) = oneshot::channel();
        let listener = Arc::clone(&self.listener);
        tokio::spawn(async move {
            match listener.accept().await {
                Ok((connection, peer)) => {
                    debug!("capture stream connected from {}", peer);
                    // A dropped receiver means the session was abandoned
                    // before the process connected; the connection closes.
                    let _ = tx.send(connection);
                }
                Err(e) => {
                    error!("stream accept failed: {}", e);
                }
            }
        });
        rx
    }
}
