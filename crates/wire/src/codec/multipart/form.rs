//! `multipart/form-data` encoding for uploads.

use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::multipart::generate_boundary;

#[derive(Debug, Clone)]
enum Source {
    Memory(Bytes),
    File { path: PathBuf, len: u64 },
}

#[derive(Debug, Clone)]
struct FormPart {
    head: Bytes,
    source: Source,
}

impl FormPart {
    fn len(&self) -> u64 {
        let body = match &self.source {
            Source::Memory(bytes) => bytes.len() as u64,
            Source::File { len, .. } => *len,
        };
        self.head.len() as u64 + body + 2
    }
}

/// A `multipart/form-data` body built from fields and files.
///
/// The exact encoded size is known before anything is sent, so uploads carry a
/// `Content-Length`. File contents are streamed from disk when the form is written.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<FormPart>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Creates an empty form with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self { boundary: boundary.into(), parts: Vec::new() }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Adds a plain text field.
    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        let head = self.part_head(name, None, None);
        self.parts.push(FormPart { head, source: Source::Memory(Bytes::from(value.into())) });
        self
    }

    /// Adds a file whose contents are already in memory.
    pub fn bytes(mut self, name: &str, filename: &str, content_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        let content_type = content_type.unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref());
        let head = self.part_head(name, Some(filename), Some(content_type));
        self.parts.push(FormPart { head, source: Source::Memory(data.into()) });
        self
    }

    /// Adds a file from disk; the size is taken now, the contents are read when writing.
    pub async fn file(mut self, name: &str, path: impl AsRef<Path>, content_type: Option<&str>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = tokio::fs::metadata(&path).await?.len();
        let filename = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_else(|| "file".into());
        let content_type = content_type.unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref());
        let head = self.part_head(name, Some(&filename), Some(content_type));
        self.parts.push(FormPart { head, source: Source::File { path, len } });
        Ok(self)
    }

    /// Exact number of bytes [`write_to`](Self::write_to) produces.
    pub fn content_length(&self) -> u64 {
        self.parts.iter().map(FormPart::len).sum::<u64>() + self.closing().len() as u64
    }

    /// Writes the encoded form, streaming files with `tokio::io::copy`.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> std::io::Result<u64> {
        let mut written = 0;
        for part in &self.parts {
            writer.write_all(&part.head).await?;
            written += part.head.len() as u64;
            match &part.source {
                Source::Memory(bytes) => {
                    writer.write_all(bytes).await?;
                    written += bytes.len() as u64;
                }
                Source::File { path, len } => {
                    let file = tokio::fs::File::open(path).await?;
                    let copied = tokio::io::copy(&mut tokio::io::AsyncReadExt::take(file, *len), writer).await?;
                    if copied != *len {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            format!("{} changed size while uploading", path.display()),
                        ));
                    }
                    trace!(path = %path.display(), size = copied, "streamed multipart file");
                    written += copied;
                }
            }
            writer.write_all(b"\r\n").await?;
            written += 2;
        }
        let closing = self.closing();
        writer.write_all(&closing).await?;
        written += closing.len() as u64;
        Ok(written)
    }

    fn part_head(&self, name: &str, filename: Option<&str>, content_type: Option<&str>) -> Bytes {
        let mut head = BytesMut::with_capacity(128);
        head.put_slice(b"--");
        head.put_slice(self.boundary.as_bytes());
        head.put_slice(b"\r\nContent-Disposition: form-data; name=\"");
        head.put_slice(escape_quoted(name).as_bytes());
        head.put_u8(b'"');
        if let Some(filename) = filename {
            head.put_slice(b"; filename=\"");
            head.put_slice(escape_quoted(filename).as_bytes());
            head.put_u8(b'"');
        }
        if let Some(content_type) = content_type {
            head.put_slice(b"\r\nContent-Type: ");
            head.put_slice(content_type.as_bytes());
        }
        head.put_slice(b"\r\n\r\n");
        head.freeze()
    }

    fn closing(&self) -> Vec<u8> {
        format!("--{}--\r\n", self.boundary).into_bytes()
    }
}

fn escape_quoted(value: &str) -> String {
    value.replace('"', "%22").replace(['\r', '\n'], " ")
}
