//! Main proxy server implementation.
//!
//! Accepts client connections, dials the upstream server once per client
//! and hands the pair to a [`ConnectionSession`].

use std::net::SocketAddr;
use std::sync::Arc;

use psql_audit_core::ProxyConfig;
use psql_audit_log::AuditLogger;
use tokio::net::TcpListener;

use crate::error::ProxyError;
use crate::session::ConnectionSession;

/// The auditing proxy server.
#[derive(Debug)]
pub struct AuditProxy {
    config: Arc<ProxyConfig>,
    logger: AuditLogger,
}

impl AuditProxy {
    /// Create a new proxy with the given configuration.
    pub fn new(config: ProxyConfig, logger: AuditLogger) -> Self {
        Self {
            config: Arc::new(config),
            logger,
        }
    }

    /// Bind the listen address.
    pub async fn bind(&self) -> Result<TcpListener, ProxyError> {
        let address = &self.config.listen_addr;
        TcpListener::bind(address)
            .await
            .map_err(|source| ProxyError::BindFailed {
                address: address.clone(),
                source,
            })
    }

    /// Bind and run the accept loop.
    pub async fn run(&self) -> Result<(), ProxyError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Run the accept loop on an already bound listener.
    ///
    /// Returns only if accepting fails. Sessions run on their own tasks and
    /// outlive the loop.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ProxyError> {
        let local_addr = listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| self.config.listen_addr.clone());

        tracing::info!(
            address = %local_addr,
            upstream = %self.config.upstream_addr,
            tls = self.config.encryption_negotiation,
            "psql-audit listening"
        );

        loop {
            let (socket, peer_addr) = listener.accept().await.map_err(ProxyError::AcceptFailed)?;
            tracing::info!(ip = %peer_addr, "incoming connection, dialing PostgreSQL server...");
            self.dispatch(socket, peer_addr);
        }
    }

    fn dispatch(&self, socket: tokio::net::TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!(ip = %peer_addr, error = %e, "failed to set TCP_NODELAY on client socket");
        }

        let session = ConnectionSession::new(
            peer_addr.to_string(),
            self.config.clone(),
            self.logger.clone(),
        );

        tokio::spawn(async move {
            if let Err(e) = session.run(socket).await {
                tracing::error!(ip = %peer_addr, error = %e, "closing client connection");
            }
        });
    }
}
