//! Per-direction stream decoder.
//!
//! Walks the startup phases and then yields typed frames until the stream
//! ends. Every frame is consumed in full whether or not anyone is
//! interested in it, which keeps the cursor aligned with the real stream.

use futures::Stream;
use futures::stream;
use psql_audit_core::Direction;
use tokio::io::AsyncRead;

use crate::error::DecodeError;
use crate::frame::{Frame, FrameReader};
use crate::startup::{EncryptionNegotiation, StartupPhase, StartupStep};

/// One unit produced by a [`StreamDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Untyped frame read during startup.
    Startup(Frame),
    /// Byte dropped during startup (the server's SSLRequest answer).
    NegotiationResponse(u8),
    /// Typed frame.
    Typed(Frame),
}

/// Decoder for one direction of one connection.
#[derive(Debug)]
pub struct StreamDecoder<R> {
    reader: FrameReader<R>,
    negotiation: EncryptionNegotiation,
    phase: StartupPhase,
}

impl<R: AsyncRead + Unpin> StreamDecoder<R> {
    pub fn new(
        source: R,
        direction: Direction,
        negotiation: EncryptionNegotiation,
        max_frame_size: usize,
    ) -> Self {
        Self {
            reader: FrameReader::new(source, max_frame_size),
            negotiation,
            phase: StartupPhase::start(direction, negotiation),
        }
    }

    /// Decode the next unit. `Ok(None)` is a clean end of stream.
    pub async fn next(&mut self) -> Result<Option<Decoded>, DecodeError> {
        match self.phase.step() {
            StartupStep::Untyped => {
                let frame = self.reader.read_untyped().await?;
                self.phase = self.phase.next(self.negotiation);
                Ok(frame.map(Decoded::Startup))
            }
            StartupStep::DiscardByte => {
                let byte = self.reader.discard(1).await?;
                self.phase = self.phase.next(self.negotiation);
                Ok(byte.map(|b| Decoded::NegotiationResponse(b[0])))
            }
            StartupStep::Typed => Ok(self.reader.read_typed().await?.map(Decoded::Typed)),
        }
    }

    /// Lazy sequence of decoded units.
    ///
    /// Ends on a clean end of stream; a decode error is yielded once and
    /// ends the sequence.
    pub fn into_stream(self) -> impl Stream<Item = Result<Decoded, DecodeError>> {
        stream::unfold(Some(self), |state| async move {
            let mut decoder = state?;
            match decoder.next().await {
                Ok(Some(decoded)) => Some((Ok(decoded), Some(decoder))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_typed, encode_untyped};
    use futures::StreamExt;

    const MAX: usize = 1024 * 1024;

    fn ssl_request() -> Vec<u8> {
        encode_untyped(&80877103u32.to_be_bytes())
    }

    fn startup_message() -> Vec<u8> {
        let mut payload = 196608u32.to_be_bytes().to_vec();
        payload.extend_from_slice(b"user\0alice\0\0");
        encode_untyped(&payload)
    }

    async fn collect(
        wire: &[u8],
        direction: Direction,
        negotiation: EncryptionNegotiation,
    ) -> Vec<Result<Decoded, DecodeError>> {
        StreamDecoder::new(wire, direction, negotiation, MAX)
            .into_stream()
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_client_without_negotiation() {
        let mut wire = ssl_request();
        wire.extend(startup_message());
        wire.extend(encode_typed(b'Q', b"select 1\0"));

        let decoded = collect(&wire, Direction::ClientToServer, EncryptionNegotiation::Disabled).await;
        assert_eq!(decoded.len(), 3);
        assert!(matches!(&decoded[0], Ok(Decoded::Startup(f)) if f.declared_len() == 8));
        assert!(matches!(&decoded[1], Ok(Decoded::Startup(f)) if f.payload().ends_with(b"alice\0\0")));
        match &decoded[2] {
            Ok(Decoded::Typed(frame)) => {
                assert_eq!(frame.tag(), Some(b'Q'));
                assert_eq!(frame.payload().as_ref(), b"select 1\0");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_with_negotiation() {
        let mut wire = startup_message();
        wire.extend(encode_typed(b'Q', b"select 1\0"));
        wire.extend(encode_typed(b'X', b""));

        let decoded = collect(&wire, Direction::ClientToServer, EncryptionNegotiation::Enabled).await;
        assert_eq!(decoded.len(), 3);
        assert!(matches!(&decoded[0], Ok(Decoded::Startup(_))));
        assert!(matches!(&decoded[1], Ok(Decoded::Typed(f)) if f.tag() == Some(b'Q')));
        assert!(matches!(&decoded[2], Ok(Decoded::Typed(f)) if f.tag() == Some(b'X')));
    }

    #[tokio::test]
    async fn test_server_without_negotiation_discards_one_byte() {
        let mut wire = vec![b'N'];
        wire.extend(encode_typed(b'R', &0u32.to_be_bytes()));
        wire.extend(encode_typed(b'Z', b"I"));

        let decoded = collect(&wire, Direction::ServerToClient, EncryptionNegotiation::Disabled).await;
        assert_eq!(decoded.len(), 3);
        assert!(matches!(decoded[0], Ok(Decoded::NegotiationResponse(b'N'))));
        assert!(matches!(&decoded[1], Ok(Decoded::Typed(f)) if f.tag() == Some(b'R')));
        assert!(matches!(&decoded[2], Ok(Decoded::Typed(f)) if f.tag() == Some(b'Z')));
    }

    #[tokio::test]
    async fn test_server_with_negotiation_discards_nothing() {
        let mut wire = encode_typed(b'R', &0u32.to_be_bytes());
        wire.extend(encode_typed(b'Z', b"I"));

        let decoded = collect(&wire, Direction::ServerToClient, EncryptionNegotiation::Enabled).await;
        assert_eq!(decoded.len(), 2);
        assert!(matches!(&decoded[0], Ok(Decoded::Typed(f)) if f.tag() == Some(b'R')));
    }

    #[tokio::test]
    async fn test_error_ends_stream_once() {
        let mut wire = startup_message();
        wire.extend(encode_typed(b'Q', b"select 1\0"));
        wire.extend([b'Q', 0, 0, 0, 1]);
        wire.extend(encode_typed(b'Q', b"select 2\0"));

        let decoded = collect(&wire, Direction::ClientToServer, EncryptionNegotiation::Enabled).await;
        assert_eq!(decoded.len(), 3);
        assert!(matches!(decoded[2], Err(DecodeError::InvalidLength(1))));
    }

    #[tokio::test]
    async fn test_eof_during_startup_is_clean() {
        let decoded = collect(&[], Direction::ServerToClient, EncryptionNegotiation::Disabled).await;
        assert!(decoded.is_empty());

        let decoded = collect(&ssl_request(), Direction::ClientToServer, EncryptionNegotiation::Disabled).await;
        assert_eq!(decoded.len(), 1);
    }

    #[tokio::test]
    async fn test_phase_advances() {
        let mut wire = ssl_request();
        wire.extend(startup_message());
        let mut decoder = StreamDecoder::new(
            wire.as_slice(),
            Direction::ClientToServer,
            EncryptionNegotiation::Disabled,
            MAX,
        );
        assert_eq!(decoder.phase, StartupPhase::Initial);
        decoder.next().await.unwrap();
        assert_eq!(decoder.phase, StartupPhase::SecondUntyped);
        decoder.next().await.unwrap();
        assert_eq!(decoder.phase, StartupPhase::Typed);
        assert!(decoder.next().await.unwrap().is_none());
    }
}
