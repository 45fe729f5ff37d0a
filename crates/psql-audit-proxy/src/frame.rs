//! Raw frame extraction.
//!
//! Two framing shapes exist on the wire:
//!
//! ```text
//! untyped: | len: i32 BE | payload: len - 4 bytes |
//! typed:   | tag: u8 | len: i32 BE | payload: len - 4 bytes |
//! ```
//!
//! The length word counts itself but never the tag. Untyped frames only
//! appear before the first typed message (SSLRequest, StartupMessage,
//! CancelRequest).

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::DecodeError;

const LEN_SIZE: usize = 4;

/// One decoded protocol message.
///
/// `payload.len() == declared_len - 4` always holds; a short read never
/// produces a `Frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    tag: Option<u8>,
    declared_len: u32,
    payload: Bytes,
}

impl Frame {
    /// Build a typed frame around `payload`.
    pub fn typed(tag: u8, payload: impl Into<Bytes>) -> Self {
        Self::with_tag(Some(tag), payload.into())
    }

    /// Build an untyped frame around `payload`.
    pub fn untyped(payload: impl Into<Bytes>) -> Self {
        Self::with_tag(None, payload.into())
    }

    fn with_tag(tag: Option<u8>, payload: Bytes) -> Self {
        Self {
            tag,
            declared_len: (payload.len() + LEN_SIZE) as u32,
            payload,
        }
    }

    /// Tag byte, or `None` for an untyped startup frame.
    pub fn tag(&self) -> Option<u8> {
        self.tag
    }

    /// Tag as a character, `'\0'` for untyped frames.
    pub fn tag_char(&self) -> char {
        self.tag.map(char::from).unwrap_or('\0')
    }

    /// Length as declared by the frame header (includes the length word).
    pub fn declared_len(&self) -> u32 {
        self.declared_len
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// Reads length-prefixed frames off an async byte source.
///
/// End of stream on a frame boundary is reported as `Ok(None)`; end of
/// stream anywhere else is [`DecodeError::Truncated`].
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
        }
    }

    /// Read one frame without a leading tag byte.
    pub async fn read_untyped(&mut self) -> Result<Option<Frame>, DecodeError> {
        let mut len = [0u8; LEN_SIZE];
        if !self.read_header(&mut len).await? {
            return Ok(None);
        }
        self.read_body(None, i32::from_be_bytes(len)).await.map(Some)
    }

    /// Read one frame consisting of a tag, a length word and a payload.
    pub async fn read_typed(&mut self) -> Result<Option<Frame>, DecodeError> {
        let mut header = [0u8; 1 + LEN_SIZE];
        if !self.read_header(&mut header).await? {
            return Ok(None);
        }
        let len = i32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        self.read_body(Some(header[0]), len).await.map(Some)
    }

    /// Read and drop exactly `n` bytes. Returns `None` if the stream ended
    /// before the first byte.
    pub async fn discard(&mut self, n: usize) -> Result<Option<Bytes>, DecodeError> {
        let mut buf = BytesMut::zeroed(n);
        if n > 0 && !self.read_header(&mut buf).await? {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }

    /// Fill `buf` completely. `Ok(false)` means the stream was already at
    /// its end before any byte arrived.
    async fn read_header(&mut self, buf: &mut [u8]) -> Result<bool, DecodeError> {
        let read = self.fill(buf).await?;
        if read == 0 {
            return Ok(false);
        }
        if read < buf.len() {
            return Err(DecodeError::Truncated {
                expected: buf.len(),
                read,
            });
        }
        Ok(true)
    }

    async fn read_body(&mut self, tag: Option<u8>, len: i32) -> Result<Frame, DecodeError> {
        if len < LEN_SIZE as i32 {
            return Err(DecodeError::InvalidLength(len));
        }
        let declared_len = len as u32;
        if declared_len as usize > self.max_frame_size {
            return Err(DecodeError::FrameTooLarge {
                len: declared_len as usize,
                max: self.max_frame_size,
            });
        }

        let mut payload = BytesMut::zeroed(declared_len as usize - LEN_SIZE);
        let read = self.fill(&mut payload).await?;
        if read < payload.len() {
            return Err(DecodeError::Truncated {
                expected: payload.len(),
                read,
            });
        }

        Ok(Frame {
            tag,
            declared_len,
            payload: payload.freeze(),
        })
    }

    async fn fill(&mut self, buf: &mut [u8]) -> Result<usize, DecodeError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// Encode a typed frame. Used by tests and tooling that need to fabricate
/// traffic.
pub fn encode_typed(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + LEN_SIZE + payload.len());
    buf.push(tag);
    buf.extend_from_slice(&((payload.len() + LEN_SIZE) as i32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Encode an untyped frame.
pub fn encode_untyped(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LEN_SIZE + payload.len());
    buf.extend_from_slice(&((payload.len() + LEN_SIZE) as i32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}
