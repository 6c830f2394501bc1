//! Line codec for chunked analysis-service streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a configurable maximum line
//! length to prevent memory exhaustion caused by unterminated or
//! maliciously large records from a misbehaving service.
//!
//! # Usage
//!
//! Use [`SseCodec`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`] over the response byte stream. Records
//! are UTF-8 lines delimited by `\n`; a record may arrive split across any
//! number of read boundaries and is buffered until its delimiter arrives.
//!
//! # End of stream
//!
//! An unterminated trailing record at end-of-stream is discarded, never
//! emitted. The upstream service terminates every record it sends; trailing
//! bytes without a delimiter are a truncated record, not a frame.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Default maximum line length accepted by the codec: 1 MiB.
///
/// Lines exceeding the limit cause [`SseCodec::decode`] to return
/// [`AppError::Frame`] rather than allocating unbounded memory for a
/// single record.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited record codec for analysis-service response streams.
///
/// Delegates line-framing to [`LinesCodec`] with a per-instance maximum
/// length. Each newline-terminated (`\n` or `\r\n`) UTF-8 string is one
/// complete record.
#[derive(Debug)]
pub struct SseCodec(LinesCodec);

impl SseCodec {
    /// Create a codec with the given maximum record length.
    #[must_use]
    pub fn new(max_line_bytes: usize) -> Self {
        Self(LinesCodec::new_with_max_length(max_line_bytes))
    }
}

impl Default for SseCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl Decoder for SseCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next newline-terminated record from `src`.
    ///
    /// Returns `Ok(None)` when `src` contains no complete record yet
    /// (buffering). Returns `Err(AppError::Frame("line too long: …"))` when
    /// the record exceeds the configured maximum.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    /// Decode at end-of-stream, discarding any unterminated trailing record.
    ///
    /// Complete records still buffered are yielded one per call; once none
    /// remain, leftover bytes without a delimiter are dropped so the framed
    /// reader observes a clean EOF.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.0.decode(src).map_err(map_codec_error)? {
            Some(line) => Ok(Some(line)),
            None => {
                src.clear();
                Ok(None)
            }
        }
    }
}

// ── Private helper ────────────────────────────────────────────────────────────

/// Map a [`LinesCodecError`] to an [`AppError`].
fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Frame("line too long: exceeded maximum record length".into())
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
