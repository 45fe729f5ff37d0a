//! Observation pipelines, one per direction of a connection.
//!
//! Each pipeline owns a [`StreamDecoder`] over its tap and runs until the
//! tap ends or a decode error occurs. Errors are logged here and never
//! travel further: the forwarding path and the other pipeline carry on.

use futures::StreamExt;
use psql_audit_core::{Direction, ProxyConfig};
use psql_audit_log::AuditLogger;
use tokio::io::AsyncRead;

use crate::decoder::{Decoded, StreamDecoder};
use crate::error::DecodeError;
use crate::extractor::MetadataExtractor;
use crate::frame::Frame;
use crate::identity::{IdentityReader, IdentityWriter};
use crate::message::{MessageKind, StartupRequest, startup_parameters};
use crate::policy::AuditPolicy;
use crate::startup::{EncryptionNegotiation, StartupPhase};

/// How a pipeline ended.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub direction: Direction,
    /// Typed frames decoded before the pipeline stopped.
    pub typed_frames: u64,
    /// `None` on a clean end of stream.
    pub error: Option<DecodeError>,
}

impl PipelineOutcome {
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Client-to-server pipeline: audits simple queries.
#[derive(Debug)]
pub struct ClientPipeline {
    policy: AuditPolicy,
    identity: IdentityReader,
    logger: AuditLogger,
    negotiation: EncryptionNegotiation,
    max_frame_size: usize,
}

impl ClientPipeline {
    pub fn new(
        config: &ProxyConfig,
        policy: AuditPolicy,
        identity: IdentityReader,
        logger: AuditLogger,
    ) -> Self {
        Self {
            policy,
            identity,
            logger,
            negotiation: config.encryption_negotiation.into(),
            max_frame_size: config.max_frame_size,
        }
    }

    pub async fn run<R: AsyncRead + Unpin>(self, source: R) -> PipelineOutcome {
        let direction = Direction::ClientToServer;
        let decoder = StreamDecoder::new(source, direction, self.negotiation, self.max_frame_size);
        let frames = decoder.into_stream();
        futures::pin_mut!(frames);

        let mut phase = StartupPhase::start(direction, self.negotiation);
        let mut untyped = 0u32;
        let mut typed_frames = 0u64;
        while let Some(next) = frames.next().await {
            match next {
                Ok(Decoded::Startup(frame)) => {
                    untyped += 1;
                    phase = phase.next(self.negotiation);
                    self.log_startup_frame(untyped, &frame);
                }
                Ok(Decoded::Typed(frame)) => {
                    typed_frames += 1;
                    let identity = self.identity.current();
                    if let Some(event) = self.policy.audit_client_frame(&frame, &identity) {
                        self.logger.log(event).await;
                    }
                }
                Ok(Decoded::NegotiationResponse(_)) => {}
                Err(e) => {
                    if phase.is_startup() {
                        tracing::error!(ip = %self.policy.client(), err = %e, "unexpected error while reading the client startup");
                    } else {
                        tracing::error!(ip = %self.policy.client(), err = %e, "unexpected error while reading a typed client message");
                    }
                    return PipelineOutcome {
                        direction,
                        typed_frames,
                        error: Some(e),
                    };
                }
            }
        }

        tracing::debug!(ip = %self.policy.client(), frames = typed_frames, "client stream ended");
        PipelineOutcome {
            direction,
            typed_frames,
            error: None,
        }
    }

    fn log_startup_frame(&self, index: u32, frame: &Frame) {
        let client = self.policy.client();
        let Some((code, request)) = StartupRequest::from_payload(frame.payload()) else {
            tracing::warn!(ip = %client, len = frame.declared_len(), "startup frame too short for a protocol code");
            return;
        };

        if index == 1 {
            tracing::info!(ip = %client, version = code, request = ?request, "client to server");
        } else {
            tracing::debug!(ip = %client, version = code, request = ?request, "client startup frame");
        }

        if let StartupRequest::Protocol { .. } = request {
            for (key, value) in startup_parameters(frame.payload()) {
                tracing::debug!(ip = %client, key = %key, value = %value, "startup parameter");
            }
        }
    }
}

/// Server-to-client pipeline: tracks session identity and audits errors.
#[derive(Debug)]
pub struct ServerPipeline {
    policy: AuditPolicy,
    extractor: MetadataExtractor,
    logger: AuditLogger,
    negotiation: EncryptionNegotiation,
    max_frame_size: usize,
}

impl ServerPipeline {
    pub fn new(
        config: &ProxyConfig,
        policy: AuditPolicy,
        identity: IdentityWriter,
        logger: AuditLogger,
    ) -> Self {
        let extractor = MetadataExtractor::new(policy.client(), identity);
        Self {
            policy,
            extractor,
            logger,
            negotiation: config.encryption_negotiation.into(),
            max_frame_size: config.max_frame_size,
        }
    }

    pub async fn run<R: AsyncRead + Unpin>(self, source: R) -> PipelineOutcome {
        let direction = Direction::ServerToClient;
        let decoder = StreamDecoder::new(source, direction, self.negotiation, self.max_frame_size);
        let frames = decoder.into_stream();
        futures::pin_mut!(frames);

        let mut typed_frames = 0u64;
        while let Some(next) = frames.next().await {
            match next {
                Ok(Decoded::NegotiationResponse(byte)) => {
                    if byte != b'N' {
                        tracing::warn!(ip = %self.policy.client(), response = %char::from(byte), "server accepted encryption; decoding will not line up");
                    } else {
                        tracing::debug!(ip = %self.policy.client(), "server declined encryption");
                    }
                }
                Ok(Decoded::Typed(frame)) => {
                    typed_frames += 1;
                    self.observe(&frame).await;
                }
                Ok(Decoded::Startup(_)) => {}
                Err(e) => {
                    tracing::error!(ip = %self.policy.client(), err = %e, "unexpected error while reading the server response");
                    return PipelineOutcome {
                        direction,
                        typed_frames,
                        error: Some(e),
                    };
                }
            }
        }

        tracing::debug!(ip = %self.policy.client(), frames = typed_frames, "server stream ended");
        PipelineOutcome {
            direction,
            typed_frames,
            error: None,
        }
    }

    async fn observe(&self, frame: &Frame) {
        let Some(tag) = frame.tag() else {
            return;
        };
        match MessageKind::classify(Direction::ServerToClient, tag) {
            MessageKind::ParameterStatus => {
                self.extractor.observe(frame);
            }
            MessageKind::ErrorResponse => {
                if let Some(event) = self.policy.audit_server_frame(frame) {
                    self.logger.log(event).await;
                }
            }
            MessageKind::Query | MessageKind::Other(_) => {}
        }
    }
}
