//! Incremental `multipart/*` body decoder.
//!
//! The decoder walks a body of the form
//!
//! ```text
//! --boundary CRLF
//! Header: value CRLF
//! CRLF
//! payload CRLF --boundary CRLF
//! ...
//! payload CRLF --boundary-- [epilogue]
//! ```
//!
//! Part payloads are streamed to a [`PartSink`] as they arrive. When the end of a read could be
//! the start of the next delimiter those bytes are left unconsumed, the caller hands them back
//! together with the following read.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};
use http::HeaderMap;
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::head::{DEFAULT_MAX_HEAD_BYTES, DEFAULT_MAX_HEADERS, HeadKind, HeadParser, Token, append_header};
use crate::ensure;
use crate::protocol::ParseError;

/// Headers of one multipart part.
#[derive(Debug, Clone, Default)]
pub struct PartHeader {
    headers: HeaderMap,
    name: Option<String>,
    filename: Option<String>,
}

impl PartHeader {
    fn new(headers: HeaderMap) -> Self {
        let disposition = headers.get(CONTENT_DISPOSITION).and_then(|value| value.to_str().ok());
        let name = disposition.and_then(|value| disposition_param(value, "name"));
        let filename = disposition.and_then(|value| disposition_param(value, "filename"));
        Self { headers, name, filename }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The form field name from `Content-Disposition`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
    }

    pub fn mime(&self) -> Option<mime::Mime> {
        self.content_type().and_then(|value| value.parse().ok())
    }

    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }
}

/// Finds a parameter of a `Content-Disposition` value, unquoting it when needed.
fn disposition_param(value: &str, param: &str) -> Option<String> {
    let mut rest = value.split_once(';')?.1;
    loop {
        rest = rest.trim_start_matches([' ', '\t', ';']);
        let (key, after) = rest.split_once('=')?;
        let key = key.trim();
        let after = after.trim_start();

        let (found, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            let mut found = String::new();
            let mut chars = quoted.char_indices();
            let mut end = quoted.len();
            while let Some((index, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            found.push(escaped);
                        }
                    }
                    '"' => {
                        end = index + 1;
                        break;
                    }
                    c => found.push(c),
                }
            }
            (found, &quoted[end..])
        } else {
            let end = after.find(';').unwrap_or(after.len());
            (after[..end].trim().to_owned(), &after[end..])
        };

        if key.eq_ignore_ascii_case(param) {
            return Some(found);
        }
        rest = remaining;
    }
}

/// Receives the parts found by a [`MultipartDecoder`].
///
/// `on_part_begin` and `on_part_end` bracket the data of every part, so a sink can open and close
/// its backing storage there.
pub trait PartSink {
    fn on_part_begin(&mut self, header: PartHeader) -> Result<(), ParseError>;

    fn on_part_data(&mut self, data: &[u8]) -> Result<(), ParseError>;

    fn on_part_end(&mut self) -> Result<(), ParseError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    /// `--boundary` then CRLF, or `--` for a body without parts
    StartBoundary,
    /// part headers up to the blank line
    Headers,
    /// part payload up to the next delimiter
    Resource,
    /// CRLF or `--` right after a delimiter
    ResourceBoundary,
    /// epilogue, ignored
    End,
}

/// Decoder for one multipart body; create a new one for every body.
#[derive(Debug)]
pub struct MultipartDecoder {
    /// `CRLF--boundary`
    delimiter: Vec<u8>,
    state: State,
    head_parser: HeadParser,
    max_parts: usize,
    parts: usize,
    // Decoder support
    pending: VecDeque<MultipartItem>,
    eof_sent: bool,
}

impl MultipartDecoder {
    pub fn new(boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());

        Self {
            delimiter,
            state: State::StartBoundary,
            head_parser: HeadParser::with_limits(HeadKind::Part, DEFAULT_MAX_HEAD_BYTES, DEFAULT_MAX_HEADERS),
            max_parts: usize::MAX,
            parts: 0,
            pending: VecDeque::new(),
            eof_sent: false,
        }
    }

    /// Rejects bodies with more than `max_parts` parts.
    pub fn with_max_parts(mut self, max_parts: usize) -> Self {
        self.max_parts = max_parts;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::End
    }

    /// Parses as much of `buf` as possible and returns how many bytes were consumed.
    ///
    /// Bytes past the returned count must be presented again, followed by new data.
    pub fn parse<S: PartSink>(&mut self, buf: &[u8], sink: &mut S) -> Result<usize, ParseError> {
        let mut pos = 0;

        loop {
            match self.state {
                State::StartBoundary => {
                    // the first delimiter has no leading CRLF
                    let dash_boundary = &self.delimiter[2..];
                    let needed = dash_boundary.len() + 2;
                    let available = &buf[pos..];
                    let compared = available.len().min(dash_boundary.len());
                    ensure!(
                        available[..compared] == dash_boundary[..compared],
                        ParseError::invalid_multipart("body does not start with the boundary")
                    );
                    if available.len() < needed {
                        return Ok(pos);
                    }

                    self.state = match &available[dash_boundary.len()..needed] {
                        b"\r\n" => State::Headers,
                        b"--" => State::End,
                        _ => return Err(ParseError::invalid_multipart("invalid bytes after the boundary")),
                    };
                    pos += needed;
                }

                State::Headers => {
                    let mut headers = HeaderMap::new();
                    let mut collect = |token: Token<'_>| match token {
                        Token::Header(name, value) => append_header(&mut headers, name, value),
                        _ => Err(ParseError::invalid_multipart("unexpected token in part headers")),
                    };
                    let Some(consumed) = self.head_parser.parse(&buf[pos..], &mut collect)? else {
                        return Ok(pos);
                    };
                    pos += consumed;

                    self.parts += 1;
                    ensure!(self.parts <= self.max_parts, ParseError::too_many_parts(self.max_parts));

                    let header = PartHeader::new(headers);
                    trace!(name = ?header.name(), filename = ?header.filename(), "multipart part begin");
                    sink.on_part_begin(header)?;
                    self.state = State::Resource;
                }

                State::Resource => {
                    let data = &buf[pos..];
                    match find(data, &self.delimiter) {
                        Some(index) => {
                            if index > 0 {
                                sink.on_part_data(&data[..index])?;
                            }
                            pos += index + self.delimiter.len();
                            self.state = State::ResourceBoundary;
                        }
                        None => {
                            let safe = partial_delimiter_start(data, &self.delimiter);
                            if safe > 0 {
                                sink.on_part_data(&data[..safe])?;
                            }
                            return Ok(pos + safe);
                        }
                    }
                }

                State::ResourceBoundary => {
                    let Some(next) = buf.get(pos..pos + 2) else {
                        // present the delimiter again once more bytes are in
                        self.state = State::Resource;
                        return Ok(pos - self.delimiter.len());
                    };

                    self.state = match next {
                        b"\r\n" => State::Headers,
                        b"--" => State::End,
                        _ => return Err(ParseError::invalid_multipart("invalid bytes after a part delimiter")),
                    };
                    pos += 2;
                    trace!("multipart part end");
                    sink.on_part_end()?;
                }

                State::End => return Ok(buf.len()),
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    let first = needle[0];
    (0..=haystack.len() - needle.len()).find(|&i| haystack[i] == first && &haystack[i..i + needle.len()] == needle)
}

/// Index where a possible delimiter prefix starts at the end of `data`, `data.len()` if none.
fn partial_delimiter_start(data: &[u8], delimiter: &[u8]) -> usize {
    let longest = data.len().min(delimiter.len() - 1);
    (1..=longest).rev().find(|&k| data.ends_with(&delimiter[..k])).map_or(data.len(), |k| data.len() - k)
}

/// An event of a multipart body, as produced by the [`Decoder`] implementation.
#[derive(Debug, Clone)]
pub enum MultipartItem {
    PartBegin(PartHeader),
    Data(Bytes),
    PartEnd,
    Eof,
}

impl MultipartItem {
    pub fn is_eof(&self) -> bool {
        matches!(self, MultipartItem::Eof)
    }
}

struct QueueSink<'a>(&'a mut VecDeque<MultipartItem>);

impl PartSink for QueueSink<'_> {
    fn on_part_begin(&mut self, header: PartHeader) -> Result<(), ParseError> {
        self.0.push_back(MultipartItem::PartBegin(header));
        Ok(())
    }

    fn on_part_data(&mut self, data: &[u8]) -> Result<(), ParseError> {
        self.0.push_back(MultipartItem::Data(Bytes::copy_from_slice(data)));
        Ok(())
    }

    fn on_part_end(&mut self) -> Result<(), ParseError> {
        self.0.push_back(MultipartItem::PartEnd);
        Ok(())
    }
}

impl Decoder for MultipartDecoder {
    type Item = MultipartItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_empty() && !src.is_empty() {
            let mut pending = std::mem::take(&mut self.pending);
            let consumed = self.parse(src, &mut QueueSink(&mut pending));
            self.pending = pending;
            src.advance(consumed?);
        }

        if let Some(item) = self.pending.pop_front() {
            return Ok(Some(item));
        }

        if self.is_complete() && !self.eof_sent {
            self.eof_sent = true;
            return Ok(Some(MultipartItem::Eof));
        }

        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if self.is_complete() => Ok(None),
            None => Err(ParseError::invalid_multipart("body ended before the closing boundary")),
        }
    }
}
