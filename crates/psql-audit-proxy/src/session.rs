//! One proxied client connection.
//!
//! ```text
//! ACCEPTED -> PAIRED -> STREAMING -> CLOSED
//! ```
//!
//! Once streaming, each direction is forwarded on the session task and
//! teed into its own observation task. The directions close independently;
//! the session is closed once both have.

use std::sync::Arc;

use psql_audit_core::{Direction, ProxyConfig};
use psql_audit_log::AuditLogger;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::ProxyError;
use crate::identity::identity_channel;
use crate::pipeline::{ClientPipeline, PipelineOutcome, ServerPipeline};
use crate::policy::AuditPolicy;
use crate::tee::{ForwardOutcome, forward, tap};

/// Lifecycle state of a [`ConnectionSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Paired,
    Streaming,
    Closed,
}

/// Per-direction result of a finished session.
#[derive(Debug)]
pub struct DirectionSummary {
    pub direction: Direction,
    /// Bytes forwarded to the peer.
    pub forwarded: u64,
    /// Set when forwarding ended on an I/O error rather than end of stream.
    pub forward_error: Option<std::io::Error>,
    /// `None` if the observation task panicked.
    pub pipeline: Option<PipelineOutcome>,
}

/// Result of a finished session.
#[derive(Debug)]
pub struct SessionSummary {
    pub client: String,
    pub client_to_server: DirectionSummary,
    pub server_to_client: DirectionSummary,
}

/// State for one accepted client connection.
#[derive(Debug)]
pub struct ConnectionSession {
    client: String,
    config: Arc<ProxyConfig>,
    logger: AuditLogger,
    state: SessionState,
}

impl ConnectionSession {
    pub fn new(client: impl Into<String>, config: Arc<ProxyConfig>, logger: AuditLogger) -> Self {
        Self {
            client: client.into(),
            config,
            logger,
            state: SessionState::Accepted,
        }
    }

    fn transition(&mut self, state: SessionState) {
        tracing::debug!(ip = %self.client, from = ?self.state, to = ?state, "session state changed");
        self.state = state;
    }

    /// Dial the upstream server and stream until both directions close.
    ///
    /// A dial failure is returned without retrying; the client socket is
    /// dropped (and so closed) by the caller.
    pub async fn run(mut self, client: TcpStream) -> Result<SessionSummary, ProxyError> {
        let upstream = self.dial().await?;
        Ok(self.stream(client, upstream).await)
    }

    /// Connect to the configured upstream.
    pub async fn dial(&mut self) -> Result<TcpStream, ProxyError> {
        let address = self.config.upstream_addr.clone();
        let upstream = TcpStream::connect(&address).await.map_err(|source| {
            ProxyError::UpstreamConnectionFailed {
                address: address.clone(),
                source,
            }
        })?;
        if let Err(e) = upstream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY on upstream socket");
        }

        self.transition(SessionState::Paired);
        tracing::debug!(ip = %self.client, upstream = %address, "paired with upstream");
        Ok(upstream)
    }

    /// Forward and observe an already paired connection.
    pub async fn stream<C, U>(mut self, client: C, upstream: U) -> SessionSummary
    where
        C: AsyncRead + AsyncWrite + Send + 'static,
        U: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.transition(SessionState::Streaming);
        tracing::info!(ip = %self.client, "starting sniffing the PSQL protocol");

        let (client_rd, client_wr) = tokio::io::split(client);
        let (upstream_rd, upstream_wr) = tokio::io::split(upstream);

        let (to_server_tap, to_server_source) = tap();
        let (to_client_tap, to_client_source) = tap();

        let (identity_writer, identity_reader) = identity_channel();
        let policy = AuditPolicy::new(self.client.clone());

        let client_pipeline = ClientPipeline::new(
            &self.config,
            policy.clone(),
            identity_reader,
            self.logger.clone(),
        );
        let server_pipeline =
            ServerPipeline::new(&self.config, policy, identity_writer, self.logger.clone());

        let client_task = tokio::spawn(client_pipeline.run(to_server_source));
        let server_task = tokio::spawn(server_pipeline.run(to_client_source));

        let (to_server, to_client) = tokio::join!(
            forward(Direction::ClientToServer, client_rd, upstream_wr, to_server_tap),
            forward(Direction::ServerToClient, upstream_rd, client_wr, to_client_tap),
        );

        let client_to_server = self.close_direction(Direction::ClientToServer, to_server, client_task.await);
        let server_to_client = self.close_direction(Direction::ServerToClient, to_client, server_task.await);

        self.transition(SessionState::Closed);
        tracing::info!(
            ip = %self.client,
            client_to_server = client_to_server.forwarded,
            server_to_client = server_to_client.forwarded,
            "connection closed"
        );

        SessionSummary {
            client: self.client,
            client_to_server,
            server_to_client,
        }
    }

    fn close_direction(
        &self,
        direction: Direction,
        forwarded: ForwardOutcome,
        pipeline: Result<PipelineOutcome, tokio::task::JoinError>,
    ) -> DirectionSummary {
        let pipeline = match pipeline {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(ip = %self.client, direction = %direction, error = %e, "observation task failed");
                None
            }
        };

        if let Some(ref e) = forwarded.error {
            tracing::debug!(ip = %self.client, direction = %direction, error = %e, "forwarding ended with error");
        }

        DirectionSummary {
            direction,
            forwarded: forwarded.forwarded,
            forward_error: forwarded.error,
            pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_typed, encode_untyped};
    use psql_audit_log::{AuditEventType, MemorySink};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadBuf};

    /// Client socket that sends `data` and then reports a connection reset.
    struct ResettingClient {
        data: Vec<u8>,
        pos: usize,
    }

    impl AsyncRead for ResettingClient {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.pos >= self.data.len() {
                return Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()));
            }
            let n = buf.remaining().min(self.data.len() - self.pos);
            let start = self.pos;
            buf.put_slice(&self.data[start..start + n]);
            self.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for ResettingClient {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_stream_forwards_and_audits() {
        let sink = Arc::new(MemorySink::new());
        let config = Arc::new(ProxyConfig {
            encryption_negotiation: true,
            ..Default::default()
        });
        let session = ConnectionSession::new("c:1", config, AuditLogger::new(sink.clone()));
        assert_eq!(session.state, SessionState::Accepted);

        let (mut client, client_side) = tokio::io::duplex(64);
        let (upstream_side, mut server) = tokio::io::duplex(64);

        let handle = tokio::spawn(session.stream(client_side, upstream_side));

        let mut startup = 196608u32.to_be_bytes().to_vec();
        startup.extend_from_slice(b"user\0alice\0\0");
        let mut from_client = encode_untyped(&startup);
        from_client.extend(encode_typed(b'Q', b"select * from orders\0"));
        from_client.extend(encode_typed(b'X', b""));

        let mut from_server = encode_typed(b'R', &0u32.to_be_bytes());
        from_server.extend(encode_typed(b'E', b"SERROR\0Mboom\0\0"));

        let expected_at_server = from_client.clone();
        let expected_at_client = from_server.clone();
        let server_task = tokio::spawn(async move {
            server.write_all(&from_server).await.unwrap();
            server.shutdown().await.unwrap();
            let mut received = Vec::new();
            server.read_to_end(&mut received).await.unwrap();
            received
        });

        client.write_all(&from_client).await.unwrap();
        client.shutdown().await.unwrap();
        let mut at_client = Vec::new();
        client.read_to_end(&mut at_client).await.unwrap();

        let at_server = server_task.await.unwrap();
        assert_eq!(at_server, expected_at_server);
        assert_eq!(at_client, expected_at_client);

        let summary = handle.await.unwrap();
        assert_eq!(summary.client_to_server.forwarded, expected_at_server.len() as u64);
        assert!(summary.client_to_server.pipeline.as_ref().unwrap().is_clean());
        assert!(summary.server_to_client.pipeline.as_ref().unwrap().is_clean());

        let queries = sink.query(&psql_audit_log::AuditFilter {
            event_type: Some(AuditEventType::QueryIssued),
            ..Default::default()
        });
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].message, "select * from orders");

        let errors = sink.query(&psql_audit_log::AuditFilter {
            event_type: Some(AuditEventType::ServerError),
            ..Default::default()
        });
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "SERROR Mboom  ");
    }

    #[tokio::test]
    async fn test_garbage_does_not_affect_forwarding() {
        let sink = Arc::new(MemorySink::new());
        let session = ConnectionSession::new(
            "c:2",
            Arc::new(ProxyConfig::default()),
            AuditLogger::new(sink.clone()),
        );

        let (mut client, client_side) = tokio::io::duplex(1024);
        let (upstream_side, mut server) = tokio::io::duplex(1024);
        let handle = tokio::spawn(session.stream(client_side, upstream_side));

        // A negative length word kills the client decoder on the first frame.
        let garbage: Vec<u8> = [0xff, 0xff, 0xff, 0xff]
            .into_iter()
            .chain((0..4096u32).map(|i| (i * 31 % 256) as u8))
            .collect();

        let expected = garbage.clone();
        let server_task = tokio::spawn(async move {
            let mut received = Vec::new();
            server.read_to_end(&mut received).await.unwrap();
            server.shutdown().await.unwrap();
            received
        });

        client.write_all(&garbage).await.unwrap();
        client.shutdown().await.unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();

        assert_eq!(server_task.await.unwrap(), expected);
        assert!(rest.is_empty());

        let summary = handle.await.unwrap();
        let client_pipeline = summary.client_to_server.pipeline.unwrap();
        assert!(client_pipeline.error.is_some());
        assert!(summary.server_to_client.pipeline.unwrap().is_clean());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_reset_keeps_forwarded_count() {
        let session = ConnectionSession::new(
            "c:3",
            Arc::new(ProxyConfig::default()),
            AuditLogger::disabled(),
        );

        let client = ResettingClient {
            data: vec![0x42; 1000],
            pos: 0,
        };
        let (upstream_side, mut server) = tokio::io::duplex(4096);
        let handle = tokio::spawn(session.stream(client, upstream_side));

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        server.shutdown().await.unwrap();
        assert_eq!(received.len(), 1000);

        let summary = handle.await.unwrap();
        assert_eq!(summary.client_to_server.forwarded, 1000);
        let error = summary.client_to_server.forward_error.unwrap();
        assert_eq!(error.kind(), std::io::ErrorKind::ConnectionReset);
        assert_eq!(summary.server_to_client.forwarded, 0);
        assert!(summary.server_to_client.forward_error.is_none());
    }
}
