//! JSON-RPC framing over a byte stream.
//!
//! Each frame is a `Content-Length: N` header block, a blank line, then N
//! bytes of JSON.
//! [`Transport`] reads and writes whole frames; decoding the body into a
//! protocol message is left to the main loop.

use std::io::{self, BufRead, Write};

/// Errors raised while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying stream failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended in the middle of a frame.
    #[error("unexpected end of stream while reading {0}")]
    UnexpectedEof(&'static str),

    /// The header block ended without a `Content-Length` header.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// The `Content-Length` value was not a non-negative integer.
    #[error("invalid Content-Length value: {0:?}")]
    InvalidContentLength(String),

    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether the error only affects the current message.
    ///
    /// Header errors leave the stream usable; I/O failures and EOF do not.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingContentLength | Self::InvalidContentLength(_) | Self::Encode(_)
        )
    }
}

/// A framed message reader/writer.
pub struct Transport<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Transport<R, W> {
    /// Create a transport over a buffered reader and a writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read the next frame body.
    ///
    /// Blocks until a whole frame is available. Returns `Ok(None)` on a clean
    /// end of stream (no header bytes read).
    pub fn read_message(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let Some(content_length) = self.read_headers()? else {
            return Ok(None);
        };

        let mut body = vec![0u8; content_length];
        self.reader.read_exact(&mut body).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                TransportError::UnexpectedEof("message body")
            } else {
                TransportError::Io(e)
            }
        })?;
        Ok(Some(body))
    }

    /// Write one frame and flush.
    pub fn write_message(&mut self, body: &[u8]) -> Result<(), TransportError> {
        write!(self.writer, "Content-Length: {}\r\n\r\n", body.len())?;
        self.writer.write_all(body)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Serialize `value` and write it as one frame.
    pub fn write_json<T: serde::Serialize>(&mut self, value: &T) -> Result<(), TransportError> {
        let body = serde_json::to_vec(value)?;
        self.write_message(&body)
    }

    /// Parse headers up to the blank separator line.
    ///
    /// The whole header block is consumed even when `Content-Length` is bad,
    /// so only the current message is lost.
    fn read_headers(&mut self) -> Result<Option<usize>, TransportError> {
        let mut content_length: Option<Result<usize, String>> = None;
        let mut line = String::new();
        let mut saw_header_bytes = false;

        loop {
            line.clear();
            let read = self.reader.read_line(&mut line)?;
            if read == 0 {
                if saw_header_bytes {
                    return Err(TransportError::UnexpectedEof("headers"));
                }
                return Ok(None);
            }
            saw_header_bytes = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some((key, value)) = trimmed.split_once(':') {
                if key.trim().eq_ignore_ascii_case("Content-Length") {
                    let value = value.trim();
                    content_length = Some(value.parse().map_err(|_| value.to_string()));
                }
            }
        }

        match content_length {
            Some(Ok(len)) => Ok(Some(len)),
            Some(Err(value)) => Err(TransportError::InvalidContentLength(value)),
            None => Err(TransportError::MissingContentLength),
        }
    }
}

impl<R, W> Transport<R, W> {
    /// Consume the transport and return the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}
