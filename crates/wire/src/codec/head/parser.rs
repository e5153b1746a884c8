//! Incremental HTTP head tokenizer.
//!
//! The parser works in two passes over a growing buffer:
//!
//! 1. Scan for the head terminator (`CRLF CRLF`, bare `LF LF` tolerated). The scan position
//!    is remembered between calls so bytes already examined are never scanned again. Runs of
//!    printable ASCII are skipped eight bytes at a time.
//! 2. Once the terminator is found, tokenize the head in one go and deliver each token to a
//!    [`HeadSink`]. Nothing is emitted for incomplete input, which makes the token stream
//!    independent of how the bytes were split across reads.
//!
//! The same machinery parses request heads, response heads and multipart part headers,
//! selected through [`HeadKind`].

use http::Version;

use crate::ensure;
use crate::protocol::ParseError;

/// Default ceiling for the whole head, start line included.
pub const DEFAULT_MAX_HEAD_BYTES: usize = 64 * 1024;

/// Default ceiling for the number of header fields.
pub const DEFAULT_MAX_HEADERS: usize = 128;

/// What kind of head the parser expects.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HeadKind {
    /// `method SP target SP version` followed by headers
    Request,
    /// `version SP status [SP reason]` followed by headers
    Response,
    /// headers only, as found at the start of a multipart part
    Part,
}

/// A token of an HTTP head, borrowing from the parsed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Method(&'a [u8]),
    Path(&'a [u8]),
    Query(&'a [u8]),
    Version(Version),
    Status(u16),
    Reason(&'a [u8]),
    /// A header name and its OWS-trimmed value, continuation lines joined with one SP
    Header(&'a [u8], &'a [u8]),
}

/// Receives tokens from a [`HeadParser`].
///
/// Returning an error aborts the parse and is propagated to the caller unchanged.
pub trait HeadSink {
    fn on_token(&mut self, token: Token<'_>) -> Result<(), ParseError>;
}

impl<F> HeadSink for F
where
    F: FnMut(Token<'_>) -> Result<(), ParseError>,
{
    fn on_token(&mut self, token: Token<'_>) -> Result<(), ParseError> {
        self(token)
    }
}

#[derive(Debug)]
pub struct HeadParser {
    kind: HeadKind,
    scanned: usize,
    max_head_bytes: usize,
    max_headers: usize,
    folded: Vec<u8>,
}

impl HeadParser {
    pub fn new(kind: HeadKind) -> Self {
        Self::with_limits(kind, DEFAULT_MAX_HEAD_BYTES, DEFAULT_MAX_HEADERS)
    }

    pub fn with_limits(kind: HeadKind, max_head_bytes: usize, max_headers: usize) -> Self {
        Self { kind, scanned: 0, max_head_bytes, max_headers, folded: Vec::new() }
    }

    pub fn kind(&self) -> HeadKind {
        self.kind
    }

    /// How many bytes of the current buffer have been scanned without finding the terminator.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Forgets the scan position; required whenever the caller drops bytes from its buffer.
    pub fn reset(&mut self) {
        self.scanned = 0;
    }

    /// Parses `buf`, resuming the terminator scan where the previous call stopped.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(consumed))` when a complete head was tokenized; `consumed` bytes of `buf`
    ///   belong to the head (leading empty lines included)
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError)` on malformed input or when a limit is crossed
    pub fn parse<S: HeadSink>(&mut self, buf: &[u8], sink: &mut S) -> Result<Option<usize>, ParseError> {
        let scanned = self.scanned;
        self.parse_from(buf, scanned, sink)
    }

    /// Same as [`parse`](Self::parse) with an explicit count of bytes already scanned.
    pub fn parse_from<S: HeadSink>(
        &mut self,
        buf: &[u8],
        previously_scanned: usize,
        sink: &mut S,
    ) -> Result<Option<usize>, ParseError> {
        let start = match self.kind {
            HeadKind::Request | HeadKind::Response => skip_empty_lines(buf),
            HeadKind::Part => 0,
        };
        ensure!(start <= self.max_head_bytes, ParseError::too_large_header(start, self.max_head_bytes));

        let end = match self.kind {
            HeadKind::Part if buf.starts_with(b"\r\n") => Some(2),
            HeadKind::Part if buf.starts_with(b"\n") => Some(1),
            HeadKind::Part if buf == b"\r" => None,
            _ => find_head_end(buf, start, previously_scanned.max(start)),
        };

        match end {
            None => {
                self.scanned = buf.len();
                ensure!(buf.len() - start <= self.max_head_bytes, ParseError::too_large_header(buf.len() - start, self.max_head_bytes));
                Ok(None)
            }
            Some(end) => {
                self.scanned = 0;
                ensure!(end - start <= self.max_head_bytes, ParseError::too_large_header(end - start, self.max_head_bytes));
                self.tokenize(&buf[start..end], sink)?;
                Ok(Some(end))
            }
        }
    }

    fn tokenize<S: HeadSink>(&mut self, head: &[u8], sink: &mut S) -> Result<(), ParseError> {
        let mut lines = head.split(|b| *b == b'\n').map(trim_cr).peekable();

        match self.kind {
            HeadKind::Request => parse_request_line(lines.next().unwrap_or_default(), sink)?,
            HeadKind::Response => parse_status_line(lines.next().unwrap_or_default(), sink)?,
            HeadKind::Part => {}
        }

        let mut header_count = 0;
        while let Some(line) = lines.next() {
            if line.is_empty() {
                break;
            }
            ensure!(!is_ows(line[0]), ParseError::invalid_header("continuation line without a header"));

            header_count += 1;
            ensure!(header_count <= self.max_headers, ParseError::too_many_headers(self.max_headers));

            let (name, value) = split_header_line(line)?;

            if !lines.peek().is_some_and(|next| next.first().is_some_and(|b| is_ows(*b))) {
                sink.on_token(Token::Header(name, value))?;
                continue;
            }

            // obs-fold: join continuation lines with a single SP
            self.folded.clear();
            self.folded.extend_from_slice(value);
            while let Some(next) = lines.next_if(|next| next.first().is_some_and(|b| is_ows(*b))) {
                let continued = trim_ows(next);
                ensure!(continued.iter().all(|b| is_value_byte(*b)), ParseError::invalid_header("invalid byte in continuation line"));
                if !continued.is_empty() {
                    if !self.folded.is_empty() {
                        self.folded.push(b' ');
                    }
                    self.folded.extend_from_slice(continued);
                }
            }
            sink.on_token(Token::Header(name, &self.folded))?;
        }

        Ok(())
    }
}

fn parse_request_line<S: HeadSink>(line: &[u8], sink: &mut S) -> Result<(), ParseError> {
    let mut parts = line.splitn(3, |b| *b == b' ');
    let method = parts.next().unwrap_or_default();
    let target = parts.next().ok_or(ParseError::InvalidUri)?;
    let version = parts.next().ok_or_else(|| ParseError::invalid_version("missing"))?;

    ensure!(!method.is_empty() && method.iter().all(|b| is_tchar(*b)), ParseError::InvalidMethod);
    ensure!(!target.is_empty() && target.iter().all(|b| (0x21..=0x7e).contains(b)), ParseError::InvalidUri);
    let version = parse_version(version)?;

    sink.on_token(Token::Method(method))?;
    match target.iter().position(|b| *b == b'?') {
        Some(index) => {
            sink.on_token(Token::Path(&target[..index]))?;
            sink.on_token(Token::Query(&target[index + 1..]))?;
        }
        None => sink.on_token(Token::Path(target))?,
    }
    sink.on_token(Token::Version(version))
}

fn parse_status_line<S: HeadSink>(line: &[u8], sink: &mut S) -> Result<(), ParseError> {
    ensure!(line.len() >= 12 && line[8] == b' ', ParseError::invalid_status(String::from_utf8_lossy(line)));
    let version = parse_version(&line[..8])?;

    let code = &line[9..12];
    ensure!(code.iter().all(u8::is_ascii_digit), ParseError::invalid_status("status code is not 3 digits"));
    let status = code.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));
    ensure!(status >= 100, ParseError::invalid_status(format!("status code {status} out of range")));

    let reason = match &line[12..] {
        [] => &[][..],
        [b' ', reason @ ..] => reason,
        _ => return Err(ParseError::invalid_status("status code is not 3 digits")),
    };
    ensure!(reason.iter().all(|b| is_value_byte(*b)), ParseError::invalid_status("invalid byte in reason phrase"));

    sink.on_token(Token::Version(version))?;
    sink.on_token(Token::Status(status))?;
    sink.on_token(Token::Reason(reason))
}

fn parse_version(bytes: &[u8]) -> Result<Version, ParseError> {
    match bytes {
        b"HTTP/1.0" => Ok(Version::HTTP_10),
        [b'H', b'T', b'T', b'P', b'/', b'1', b'.', minor] if minor.is_ascii_digit() => Ok(Version::HTTP_11),
        _ => Err(ParseError::invalid_version(String::from_utf8_lossy(bytes))),
    }
}

fn split_header_line(line: &[u8]) -> Result<(&[u8], &[u8]), ParseError> {
    let colon = line.iter().position(|b| *b == b':').ok_or_else(|| ParseError::invalid_header("missing colon"))?;
    let name = &line[..colon];
    ensure!(!name.is_empty(), ParseError::invalid_header("empty header name"));
    ensure!(
        name.iter().all(|b| is_tchar(*b)),
        ParseError::invalid_header(format!("invalid header name {:?}", String::from_utf8_lossy(name)))
    );

    let value = trim_ows(&line[colon + 1..]);
    ensure!(
        value.iter().all(|b| is_value_byte(*b)),
        ParseError::invalid_header(format!("invalid byte in value of {:?}", String::from_utf8_lossy(name)))
    );
    Ok((name, value))
}

/// Finds the end of the head, examining only bytes from `from` onwards.
fn find_head_end(buf: &[u8], start: usize, from: usize) -> Option<usize> {
    let mut i = from;
    while i < buf.len() {
        if let Some(word) = buf.get(i..i + 8) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(word);
            if is_printable_word(u64::from_le_bytes(bytes)) {
                i += 8;
                continue;
            }
        }

        if buf[i] == b'\n' {
            if i >= start + 1 && buf[i - 1] == b'\n' {
                return Some(i + 1);
            }
            if i >= start + 2 && buf[i - 1] == b'\r' && buf[i - 2] == b'\n' {
                return Some(i + 1);
            }
        }
        i += 1;
    }
    None
}

/// True when all eight bytes are in `0x20..0x80`, i.e. none can be CR or LF.
#[inline]
fn is_printable_word(word: u64) -> bool {
    const LOW: u64 = 0x2020_2020_2020_2020;
    const HIGH: u64 = 0x8080_8080_8080_8080;
    (word.wrapping_sub(LOW) | word) & HIGH == 0
}

fn skip_empty_lines(buf: &[u8]) -> usize {
    let mut i = 0;
    loop {
        match &buf[i..] {
            [b'\r', b'\n', ..] => i += 2,
            [b'\n', ..] => i += 1,
            _ => return i,
        }
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn trim_ows(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !is_ows(*first) {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !is_ows(*last) {
            break;
        }
        bytes = rest;
    }
    bytes
}

#[inline]
fn is_ows(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

#[inline]
fn is_value_byte(b: u8) -> bool {
    b == b'\t' || (0x20..=0x7e).contains(&b) || b >= 0x80
}

/// RFC 9110 tchar
#[inline]
fn is_tchar(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
        | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z')
}
