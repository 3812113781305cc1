//! HTTP server lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hearsay_core::ServerConfig;
use hearsay_rumor::ContentMutationService;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to parse or bind the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Parse `host:port` from the server config.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is not valid.
pub fn socket_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
    let addr = format!("{}:{}", config.host, config.port);
    addr.parse()
        .map_err(|e| ServerError::Bind(format!("invalid address {addr}: {e}")))
}

/// Serve the rumor API until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the listener cannot bind, or
/// [`ServerError::Serve`] on a fatal I/O error.
pub async fn start_server<M, F>(
    config: &ServerConfig,
    state: Arc<AppState<M>>,
    shutdown: F,
) -> Result<(), ServerError>
where
    M: ContentMutationService + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let addr = socket_addr(config)?;
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "rumor API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("rumor API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_addr_validates_host() {
        let ok = ServerConfig {
            host: String::from("127.0.0.1"),
            port: 8080,
        };
        assert!(socket_addr(&ok).is_ok());

        let bad = ServerConfig {
            host: String::from("not a host"),
            port: 8080,
        };
        assert!(matches!(socket_addr(&bad), Err(ServerError::Bind(_))));
    }
}
