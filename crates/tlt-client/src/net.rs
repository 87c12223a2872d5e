use std::net::SocketAddr;

use tlt_core::{ClientCommand, ServerMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:12345";

pub fn server_addr() -> String {
    std::env::var("TLT_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string())
}

pub struct NetworkClient {
    pub sender: mpsc::UnboundedSender<ClientCommand>,
    pub receiver: mpsc::UnboundedReceiver<ServerMessage>,
    writer: JoinHandle<()>,
}

impl NetworkClient {
    /// Connect to the server and send the `CONNECT` handshake.
    pub async fn connect(addr: &str, username: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer: SocketAddr = stream.peer_addr()?;
        debug!(%peer, "connected");
        let (read_half, mut write_half) = stream.into_split();

        let (client_tx, mut client_rx) = mpsc::unbounded_channel::<ClientCommand>();
        let (server_tx, server_rx) = mpsc::unbounded_channel::<ServerMessage>();

        // Sender task: forward commands to the socket, one per line
        let writer = tokio::spawn(async move {
            while let Some(cmd) = client_rx.recv().await {
                let line = format!("{}\n", cmd);
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        // Receiver task: parse server lines into the channel
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match line.parse::<ServerMessage>() {
                    Ok(msg) => {
                        if server_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "ignoring server line"),
                }
            }
        });

        let client = Self {
            sender: client_tx,
            receiver: server_rx,
            writer,
        };
        client.send(ClientCommand::Connect {
            username: username.to_string(),
        });
        Ok(client)
    }

    pub fn send(&self, cmd: ClientCommand) {
        let _ = self.sender.send(cmd);
    }

    /// Flush queued commands and close our half of the connection.
    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.writer.await;
    }
}
