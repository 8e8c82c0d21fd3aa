use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use dirship_protocol::ChunkCodec;

use crate::ReceiverError;
use crate::handler::MessageHandler;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Working root directory; all uploaded paths resolve under it.
    pub working_root: PathBuf,
}

/// The receiver TCP server.
///
/// Accepts any number of simultaneous connections; each gets its own task
/// and its own [`MessageHandler`] over the shared working root. Connections
/// share no protocol state; overlapping writes are last-write-wins.
pub struct ReceiverServer {
    port: u16,
    working_root: PathBuf,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl ReceiverServer {
    /// Creates a new server for the given configuration.
    pub fn new(config: ReceiverConfig) -> Arc<Self> {
        Arc::new(Self {
            port: config.port,
            working_root: config.working_root,
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Gracefully shuts down the server and its connections.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the accept loop until cancellation.
    ///
    /// The working root is created if absent before the socket binds.
    pub async fn run(self: &Arc<Self>) -> Result<(), ReceiverError> {
        tokio::fs::create_dir_all(&self.working_root).await?;

        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!(
            addr = %local_addr,
            root = %self.working_root.display(),
            "receiver listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("receiver shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    tracing::error!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Reads framed chunk messages from one connection until EOF, protocol
    /// error, or shutdown. Filesystem trouble never ends the connection;
    /// a frame that fails to decode does.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ReceiverError> {
        tracing::info!(%peer_addr, "connection established");
        let handler = MessageHandler::new(self.working_root.clone());
        let mut framed = Framed::new(stream, ChunkCodec);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(%peer_addr, "connection closed by shutdown");
                    break Ok(());
                }

                frame = framed.next() => {
                    match frame {
                        Some(Ok(msg)) => handler.handle(msg).await,
                        Some(Err(e)) => break Err(e.into()),
                        None => {
                            tracing::info!(%peer_addr, "connection closed");
                            break Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirship_protocol::ChunkMessage;
    use futures_util::SinkExt;

    async fn start_server(root: &std::path::Path) -> (Arc<ReceiverServer>, tokio::task::JoinHandle<()>, u16) {
        let server = ReceiverServer::new(ReceiverConfig {
            port: 0,
            working_root: root.to_path_buf(),
        });
        let server2 = Arc::clone(&server);
        let handle = tokio::spawn(async move {
            server2.run().await.unwrap();
        });
        // Wait for the server to bind.
        let mut port = 0;
        for _ in 0..50 {
            port = server.port().await;
            if port > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(port > 0, "server should have bound to a dynamic port");
        (server, handle, port)
    }

    #[tokio::test]
    async fn server_binds_dynamic_port_and_shuts_down() {
        let tmp = tempfile::tempdir().unwrap();
        let (server, handle, _port) = start_server(tmp.path()).await;
        assert!(server.local_addr().await.is_some());
        server.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn server_creates_working_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("not/yet/created");
        let (server, handle, _port) = start_server(&root).await;
        assert!(root.is_dir());
        server.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn server_writes_chunks_from_connection() {
        let tmp = tempfile::tempdir().unwrap();
        let (server, handle, port) = start_server(tmp.path()).await;

        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut framed = Framed::new(stream, ChunkCodec);
        framed
            .send(ChunkMessage::data("hello.bin", 0, b"hello "))
            .await
            .unwrap();
        framed
            .send(ChunkMessage::data("hello.bin", 6, b"world"))
            .await
            .unwrap();
        drop(framed);

        // Give the connection task time to drain.
        for _ in 0..50 {
            if tmp.path().join("hello.bin").exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(
            std::fs::read(tmp.path().join("hello.bin")).unwrap(),
            b"hello world"
        );

        server.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_connections_are_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let (server, handle, port) = start_server(tmp.path()).await;

        let mut a = Framed::new(
            TcpStream::connect(("127.0.0.1", port)).await.unwrap(),
            ChunkCodec,
        );
        let mut b = Framed::new(
            TcpStream::connect(("127.0.0.1", port)).await.unwrap(),
            ChunkCodec,
        );
        a.send(ChunkMessage::data("a.bin", 0, b"from a")).await.unwrap();
        b.send(ChunkMessage::data("b.bin", 0, b"from b")).await.unwrap();
        drop(a);
        drop(b);

        for _ in 0..50 {
            if tmp.path().join("a.bin").exists() && tmp.path().join("b.bin").exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(std::fs::read(tmp.path().join("a.bin")).unwrap(), b"from a");
        assert_eq!(std::fs::read(tmp.path().join("b.bin")).unwrap(), b"from b");

        server.shutdown();
        handle.await.unwrap();
    }
}
