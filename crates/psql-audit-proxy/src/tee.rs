//! Byte forwarding with a tap for the decoders.
//!
//! [`forward`] copies one direction of a connection to its peer and hands
//! every chunk to an unbounded [`TapSender`]. The matching [`TapReader`] is
//! an `AsyncRead` the decoder pulls from. Sending to the tap never waits,
//! so a slow or failed decoder cannot hold back forwarding.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use psql_audit_core::Direction;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

const CHUNK_SIZE: usize = 16 * 1024;

/// Create a connected tap pair.
pub fn tap() -> (TapSender, TapReader) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TapSender { tx: Some(tx) }, StreamReader::new(TapStream { rx }))
}

/// Sending half of a tap.
#[derive(Debug)]
pub struct TapSender {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
}

impl TapSender {
    /// Copy a chunk to the decoder. Once the decoder has gone away the tap
    /// stops buffering.
    pub fn send(&mut self, chunk: Bytes) {
        if let Some(tx) = &self.tx {
            if tx.send(chunk).is_err() {
                self.tx = None;
            }
        }
    }

    /// Whether a decoder is still listening.
    pub fn is_open(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// Chunks sent through a tap, as a stream.
#[derive(Debug)]
pub struct TapStream {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Stream for TapStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}

/// Receiving half of a tap. Reaches end of stream once the sender is
/// dropped and every buffered chunk has been read.
pub type TapReader = StreamReader<TapStream, Bytes>;

/// How one call to [`forward`] ended.
#[derive(Debug)]
pub struct ForwardOutcome {
    /// Bytes written to the peer, including those written before an error.
    pub forwarded: u64,
    /// `None` when `src` reached end of stream.
    pub error: Option<io::Error>,
}

/// Copy `src` to `dst` until `src` ends, teeing every chunk into `tap`.
///
/// The write half of `dst` is shut down on every exit path so the peer
/// sees the half-close. The tap is dropped on return, which ends the
/// decoder's stream.
pub async fn forward<R, W>(
    direction: Direction,
    mut src: R,
    mut dst: W,
    mut tap: TapSender,
) -> ForwardOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut forwarded = 0u64;
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    let mut tapping = true;

    let error = loop {
        buf.reserve(CHUNK_SIZE);
        let n = match src.read_buf(&mut buf).await {
            Ok(0) => break None,
            Ok(n) => n,
            Err(e) => break Some(e),
        };

        let chunk = buf.split().freeze();
        if tapping {
            tap.send(chunk.clone());
            if !tap.is_open() {
                tapping = false;
                tracing::debug!(direction = %direction, "decoder stopped, forwarding without tap");
            }
        }
        if let Err(e) = dst.write_all(&chunk).await {
            break Some(e);
        }
        forwarded += n as u64;
    };

    if let Err(e) = dst.shutdown().await {
        tracing::debug!(direction = %direction, error = %e, "shutdown after forwarding failed");
    }
    ForwardOutcome { forwarded, error }
}
