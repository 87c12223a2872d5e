pub mod codec;
pub mod config;
pub mod conn;
pub mod error;
pub mod matchmaker;
pub mod registry;
pub mod session;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::state::AppState;

/// Bind the listener and create fresh shared state.
pub async fn build_server(config: &ServerConfig) -> Result<(TcpListener, Arc<AppState>), ServerError> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind_addr,
            source,
        })?;
    Ok((listener, Arc::new(AppState::new())))
}

/// Accept connections forever, one task per connection.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    info!(addr = %listener.local_addr()?, "listening");
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            conn::handle_connection(state, stream, peer).await;
        });
    }
}
