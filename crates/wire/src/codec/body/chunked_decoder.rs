//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module provides functionality to decode HTTP messages that use chunked transfer encoding
//! as specified in [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).
//!
//! The core routine, [`ChunkedDecoder::decode_in_place`], rewrites a window of raw bytes into the
//! decoded payload without allocating: every input byte is examined once and payload bytes are
//! moved towards the front of the same buffer. The [`Decoder`] implementation is a thin layer over
//! it for use with `FramedRead`.

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use std::task::Poll;
use tokio_util::codec::Decoder;
use tracing::trace;
use ChunkedState::*;

/// A decoder for handling HTTP chunked transfer encoding.
///
/// The decoder processes incoming bytes according to the chunked format:
/// - Each chunk starts with its size in hexadecimal
/// - Followed by optional extensions and CRLF
/// - Then the chunk data and CRLF
/// - A zero-sized chunk indicates the end of the message, optionally followed by trailers
///
/// State survives across calls, so input may be split anywhere, including inside the size line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    eof_sent: bool,
}

/// Outcome of one [`ChunkedDecoder::decode_in_place`] call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InPlace {
    /// Decoded payload now sits in `buf[..written]`
    pub written: usize,
    /// Input bytes examined; `written <= consumed`
    pub consumed: usize,
    /// The last chunk and the trailer section have been read
    pub complete: bool,
}

impl ChunkedDecoder {
    /// Creates a new ChunkedDecoder instance.
    ///
    /// The decoder starts in the Size state, ready to read the size of the first chunk.
    pub fn new() -> Self {
        Self { state: Size, remaining_size: 0, eof_sent: false }
    }

    /// Bytes still owed by the chunk currently being read.
    pub fn remaining(&self) -> u64 {
        if self.state == Body { self.remaining_size } else { 0 }
    }

    pub fn is_complete(&self) -> bool {
        self.state == End
    }

    /// Decodes as much of `buf` as possible in place.
    ///
    /// Stops early once the body is complete, so bytes following the chunked body (a pipelined
    /// request, say) are left untouched past `consumed`.
    pub fn decode_in_place(&mut self, buf: &mut [u8]) -> Result<InPlace, ParseError> {
        let mut cursor = InPlaceCursor { buf, read: 0, written: 0 };

        while self.state != End {
            self.state = match self.state.step(&mut cursor, &mut self.remaining_size) {
                Poll::Pending => break,
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };
        }

        Ok(InPlace { written: cursor.written, consumed: cursor.read, complete: self.state == End })
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Handle whitespace after size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// Read LF after chunk size
    SizeLf,
    /// Read chunk data
    Body,
    /// Read CR after chunk data
    BodyCr,
    /// Read LF after chunk data
    BodyLf,
    /// Read optional trailer fields
    Trailer,
    /// Read LF after trailer
    TrailerLf,
    /// Read final CR
    EndCr,
    /// Read final LF
    EndLf,
    /// Final state after reading last chunk
    End,
}

/// Read and write positions over the buffer being decoded.
struct InPlaceCursor<'a> {
    buf: &'a mut [u8],
    read: usize,
    written: usize,
}

impl InPlaceCursor<'_> {
    #[inline]
    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.buf.get(self.read).copied()?;
        self.read += 1;
        Some(byte)
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.read
    }

    /// Moves up to `max` payload bytes down to the write position.
    fn move_payload(&mut self, max: usize) -> usize {
        let n = max.min(self.remaining());
        if self.read != self.written {
            self.buf.copy_within(self.read..self.read + n, self.written);
        }
        self.read += n;
        self.written += n;
        n
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes chunked transfer encoded data from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` with all payload decoded from the buffered bytes
    /// - `Ok(Some(PayloadItem::Eof))` when the final chunk is processed
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError)` if the chunked encoding is invalid
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.state != End && !src.is_empty() {
            let in_place = self.decode_in_place(&mut src[..])?;
            let mut decoded = src.split_to(in_place.consumed);
            decoded.truncate(in_place.written);

            if !decoded.is_empty() {
                trace!(len = decoded.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(decoded.freeze())));
            }
        }

        if self.state == End && !self.eof_sent {
            trace!("finished reading chunked data");
            self.eof_sent = true;
            return Ok(Some(PayloadItem::Eof));
        }

        Ok(None)
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        match $src.next_byte() {
            Some(byte) => byte,
            None => return Poll::Pending,
        }
    }};
}

impl ChunkedState {
    /// Processes the next step in the chunked decoding state machine.
    ///
    /// # Arguments
    /// * `src` - Cursor over the buffer being decoded in place
    /// * `remaining_size` - Tracks remaining bytes in current chunk
    ///
    /// # Returns
    /// The next state, `Pending` when the buffer is exhausted, or an error if invalid encoding is
    /// detected
    fn step(&self, src: &mut InPlaceCursor<'_>, remaining_size: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        match self {
            Size => ChunkedState::read_size(src, remaining_size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, remaining_size),
            Body => ChunkedState::read_body(src, remaining_size),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            Trailer => ChunkedState::read_trailer(src),
            TrailerLf => ChunkedState::read_trailer_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// Reads and parses the chunk size in hexadecimal format.
    ///
    /// The size is read digit by digit until a delimiter is encountered.
    /// Supports both uppercase and lowercase hex digits.
    ///
    /// # State Transitions
    /// - On hex digit (0-9, a-f, A-F): Stay in Size state to read more digits
    /// - On whitespace (tab/space): Transition to SizeLws state
    /// - On semicolon: Transition to Extension state to handle chunk extensions
    /// - On CR: Transition to SizeLf state to finish size line
    /// - On invalid character: Return error
    fn read_size(src: &mut InPlaceCursor<'_>, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        macro_rules! or_overflow {
            ($e:expr) => {
                match $e {
                    Some(val) => val,
                    None => return Poll::Ready(Err(ParseError::ChunkSizeOverflow)),
                }
            };
        }

        let radix = 16;
        let digit = match try_next_byte!(src) {
            b @ b'0'..=b'9' => b - b'0',
            b @ b'a'..=b'f' => b + 10 - b'a',
            b @ b'A'..=b'F' => b + 10 - b'A',
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws)),
            b';' => return Poll::Ready(Ok(Extension)),
            b'\r' => return Poll::Ready(Ok(SizeLf)),
            _ => return Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk size line: Invalid Size"))),
        };

        *size_per_chunk = or_overflow!(size_per_chunk.checked_mul(radix));
        *size_per_chunk = or_overflow!(size_per_chunk.checked_add(u64::from(digit)));

        Poll::Ready(Ok(Size))
    }

    /// Processes linear whitespace (LWS) after the chunk size.
    ///
    /// State transitions:
    /// - On tab/space: Stay in SizeLws state to handle more whitespace
    /// - On semicolon: Move to Extension state to process chunk extensions
    /// - On CR: Move to SizeLf state to finish size line
    /// - On invalid char: Return error
    fn read_size_lws(src: &mut InPlaceCursor<'_>) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            // LWS can follow the chunk size, but no more digits can come
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk size linear white space"))),
        }
    }

    /// Skips chunk extensions, which end at the next CRLF.
    ///
    /// A plain LF inside an extension is rejected.
    fn read_extension(src: &mut InPlaceCursor<'_>) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk extension contains newline"))),
            _ => Poll::Ready(Ok(Extension)), // no supported extensions
        }
    }

    /// Validates the LF byte after the chunk size line.
    ///
    /// # State Transitions
    /// - On LF with size 0: Move to EndCr state for final CRLF
    /// - On LF with size > 0: Move to Body state to read chunk data
    /// - On any other byte: Return error
    fn read_size_lf(src: &mut InPlaceCursor<'_>, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => {
                if *size_per_chunk == 0 {
                    Poll::Ready(Ok(EndCr))
                } else {
                    Poll::Ready(Ok(Body))
                }
            }

            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk size LF"))),
        }
    }

    /// Moves chunk data down to the write position.
    ///
    /// # State Transitions
    /// - On empty input: Pending
    /// - After reading data with remaining size > 0: Stay in Body state
    /// - After reading data with remaining size = 0: Move to BodyCr state
    fn read_body(src: &mut InPlaceCursor<'_>, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        if *size_per_chunk == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        if src.remaining() == 0 {
            return Poll::Pending;
        }

        // cap remaining bytes at the max capacity of usize
        let remaining = usize::try_from(*size_per_chunk).unwrap_or(usize::MAX);
        let read_size = src.move_payload(remaining);
        *size_per_chunk -= read_size as u64;

        if *size_per_chunk > 0 {
            Poll::Ready(Ok(Body))
        } else {
            Poll::Ready(Ok(BodyCr))
        }
    }

    fn read_body_cr(src: &mut InPlaceCursor<'_>) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk body CR"))),
        }
    }

    fn read_body_lf(src: &mut InPlaceCursor<'_>) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(Size)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk body LF"))),
        }
    }

    /// Processes optional trailer fields after the last chunk.
    ///
    /// Trailer fields are read but ignored.
    fn read_trailer(src: &mut InPlaceCursor<'_>) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut InPlaceCursor<'_>) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid trailer end LF"))),
        }
    }

    /// Validates the final CR byte of the chunked message.
    ///
    /// # State Transitions
    /// - On CR: Move to EndLf state
    /// - On any other byte: Move to Trailer state to handle as trailer field
    fn read_end_cr(src: &mut InPlaceCursor<'_>) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut InPlaceCursor<'_>) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk end LF"))),
        }
    }
}
