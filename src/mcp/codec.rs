/// Content-Length framing for JSON-RPC messages
///
/// Every message on the wire is a small header block terminated by an empty
/// line, followed by exactly `Content-Length` bytes of UTF-8 JSON:
///
/// ```text
/// Content-Length: 52\r\n
/// \r\n
/// {"jsonrpc":"2.0","id":1,"method":"tools/list"}
/// ```

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Default upper bound for a single payload (4 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Largest payload limit a server may be configured with (1 GiB)
pub const FRAME_SIZE_CEILING: usize = 1024 * 1024 * 1024;

/// A header block larger than this without a terminator is treated as garbage
pub const MAX_HEADER_SIZE: usize = 8 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK_SIZE: usize = 8 * 1024;
const LOG_PREVIEW_CHARS: usize = 100;

/// Errors that break byte alignment on the stream
///
/// Once one of these is returned the reader cannot tell where the next
/// message starts, so the connection has to be closed.
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("Frame header is missing Content-Length")]
    MissingContentLength,

    #[error("Invalid Content-Length value: {0:?}")]
    InvalidContentLength(String),

    #[error("Malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("Header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("Frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { length: usize, limit: usize },

    #[error("Stream ended in the middle of a frame")]
    UnexpectedEof,

    #[error("Failed to encode outgoing message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A correctly framed payload that is not valid JSON
///
/// The frame has already been consumed, so the stream stays aligned.
#[derive(Error, Debug)]
#[error("Parse error: {0}")]
pub struct ParseError(#[source] pub serde_json::Error);

/// One decoded unit from the stream
#[derive(Debug)]
pub enum Frame {
    /// Payload parsed as JSON
    Message(Value),
    /// Payload was framed correctly but is not JSON
    Malformed(ParseError),
}

/// Reads Content-Length framed JSON payloads from a byte stream
///
/// Bytes are buffered across reads, so a header and its payload may arrive
/// split over any number of chunks. The only await point in
/// [`FrameReader::next_frame`] is a single `read`, which makes it safe to use
/// inside `tokio::select!`.
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
    chunk: Box<[u8]>,
    /// Header already parsed for the frame at the front of the buffer:
    /// (offset of the payload, offset just past it)
    pending: Option<(usize, usize)>,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with the default frame size limit
    pub fn new(reader: R) -> Self {
        Self::with_max_frame_size(reader, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a reader that rejects payloads larger than `max_frame_size`
    pub fn with_max_frame_size(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
            pending: None,
            max_frame_size,
        }
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` when the stream closes cleanly between frames.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, FramingError> {
        loop {
            if let Some(frame) = self.try_decode()? {
                return Ok(Some(frame));
            }

            let read = self.reader.read(&mut self.chunk).await?;
            if read == 0 {
                let only_whitespace = self.buffer.iter().all(|b| b.is_ascii_whitespace());
                if self.pending.is_none() && only_whitespace {
                    return Ok(None);
                }
                return Err(FramingError::UnexpectedEof);
            }
            self.buffer.extend_from_slice(&self.chunk[..read]);
        }
    }

    /// Try to cut one complete frame out of the buffer
    fn try_decode(&mut self) -> Result<Option<Frame>, FramingError> {
        let (body_start, frame_end) = match self.pending {
            Some(pending) => pending,
            None => {
                // Tolerate stray line breaks between messages
                let skip = self
                    .buffer
                    .iter()
                    .take_while(|b| matches!(b, b'\r' | b'\n'))
                    .count();
                if skip > 0 {
                    self.buffer.drain(..skip);
                }

                let header_end = match find(&self.buffer, HEADER_TERMINATOR) {
                    Some(pos) => pos,
                    None if self.buffer.len() > MAX_HEADER_SIZE => {
                        return Err(FramingError::HeaderTooLarge { limit: MAX_HEADER_SIZE });
                    }
                    None => return Ok(None),
                };
                if header_end > MAX_HEADER_SIZE {
                    return Err(FramingError::HeaderTooLarge { limit: MAX_HEADER_SIZE });
                }

                let length = parse_content_length(&self.buffer[..header_end])?;
                if length > self.max_frame_size {
                    return Err(FramingError::FrameTooLarge {
                        length,
                        limit: self.max_frame_size,
                    });
                }

                let body_start = header_end + HEADER_TERMINATOR.len();
                let frame_end = body_start.checked_add(length).ok_or(FramingError::FrameTooLarge {
                    length,
                    limit: self.max_frame_size,
                })?;
                self.pending = Some((body_start, frame_end));
                (body_start, frame_end)
            }
        };

        if self.buffer.len() < frame_end {
            return Ok(None);
        }

        let payload = &self.buffer[body_start..frame_end];
        debug!("[RECV] {}", preview(&String::from_utf8_lossy(payload)));
        let frame = match serde_json::from_slice::<Value>(payload) {
            Ok(value) => Frame::Message(value),
            Err(e) => Frame::Malformed(ParseError(e)),
        };

        self.buffer.drain(..frame_end);
        self.pending = None;
        Ok(Some(frame))
    }
}

/// Extract the payload length from a header block (terminator excluded)
///
/// The key is matched case-insensitively; unrelated headers are ignored.
pub fn parse_content_length(header: &[u8]) -> Result<usize, FramingError> {
    let text = std::str::from_utf8(header)
        .map_err(|_| FramingError::MalformedHeader(String::from_utf8_lossy(header).into_owned()))?;

    let mut content_length = None;
    for line in text.split("\r\n") {
        if line.trim().is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FramingError::MalformedHeader(line.to_string()))?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            let value = value.trim();
            let parsed = value
                .parse::<usize>()
                .map_err(|_| FramingError::InvalidContentLength(value.to_string()))?;
            content_length = Some(parsed);
        }
    }

    content_length.ok_or(FramingError::MissingContentLength)
}

/// Serialize a message into one complete frame (header plus payload)
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    let payload = serde_json::to_vec(message)?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", payload.len()).into_bytes();
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Writes framed messages to a byte stream
///
/// Each call to [`FrameWriter::send`] emits one whole frame and flushes, so
/// a single owner of the writer never interleaves frames on the wire.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Encode and write one message
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), FramingError> {
        let frame = encode_frame(message)?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            let header_len = frame
                .windows(HEADER_TERMINATOR.len())
                .position(|w| w == HEADER_TERMINATOR)
                .map_or(0, |pos| pos + HEADER_TERMINATOR.len());
            debug!("[SEND] {}", preview(&String::from_utf8_lossy(&frame[header_len..])));
        }
        Ok(())
    }

    /// Flush and shut down the underlying writer
    pub async fn shutdown(&mut self) -> Result<(), FramingError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Shorten a payload for logging without splitting a character
fn preview(text: &str) -> String {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
