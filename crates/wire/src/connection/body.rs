//! Request body acquisition: in memory, spilled to temp files, or stored part by part.
//!
//! Temp files are owned by a [`TempFile`] guard and removed when the guard drops, so an
//! aborted request never leaves files behind.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::codec::multipart::{MultipartDecoder, MultipartItem, PartHeader};
use crate::connection::route::RouteLimits;
use crate::ensure;
use crate::protocol::ParseError;

/// A file under the temp directory that is deleted when dropped, unless persisted.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    len: u64,
    keep: bool,
}

impl TempFile {
    async fn create(dir: &Path) -> io::Result<(TempFile, File)> {
        let path = dir.join(format!("micro-wire-{:016x}.tmp", fastrand::u64(..)));
        let file = OpenOptions::new().write(true).create_new(true).open(&path).await?;
        trace!(path = %path.display(), "created temp file");
        Ok((TempFile { path, len: 0, keep: false }, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the whole file back into memory.
    pub async fn read(&self) -> io::Result<Bytes> {
        tokio::fs::read(&self.path).await.map(Bytes::from)
    }

    /// Moves the file to `to`; it is no longer deleted on drop.
    pub async fn persist(mut self, to: impl AsRef<Path>) -> io::Result<()> {
        tokio::fs::rename(&self.path, to.as_ref()).await?;
        self.keep = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), cause = %e, "failed to remove temp file");
        }
    }
}

/// Where a stored part's bytes ended up.
#[derive(Debug)]
pub enum PartData {
    Memory(Bytes),
    File(TempFile),
}

/// One `multipart/form-data` part stored by [`BodyStrategy::Store`](crate::connection::BodyStrategy::Store).
#[derive(Debug)]
pub struct StoredPart {
    pub header: PartHeader,
    pub data: PartData,
}

impl StoredPart {
    pub fn name(&self) -> Option<&str> {
        self.header.name()
    }

    pub fn len(&self) -> u64 {
        match &self.data {
            PartData::Memory(bytes) => bytes.len() as u64,
            PartData::File(file) => file.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn bytes(&self) -> io::Result<Bytes> {
        match &self.data {
            PartData::Memory(bytes) => Ok(bytes.clone()),
            PartData::File(file) => file.read().await,
        }
    }
}

/// The request body handed to a handler.
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Memory(Bytes),
    /// Spilled past the heap ceiling.
    File(TempFile),
    Parts(Vec<StoredPart>),
    /// Streamed to the route's fetcher; only the size is left.
    Fetched { size: u64 },
}

impl RequestBody {
    pub fn len(&self) -> u64 {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Memory(bytes) => bytes.len() as u64,
            RequestBody::File(file) => file.len(),
            RequestBody::Parts(parts) => parts.iter().map(StoredPart::len).sum(),
            RequestBody::Fetched { size } => *size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The body as bytes, reading it back from disk if it was spilled.
    ///
    /// Stored parts and fetched bodies have no single byte representation and yield nothing.
    pub async fn bytes(&self) -> io::Result<Bytes> {
        match self {
            RequestBody::Memory(bytes) => Ok(bytes.clone()),
            RequestBody::File(file) => file.read().await,
            RequestBody::Empty | RequestBody::Parts(_) | RequestBody::Fetched { .. } => Ok(Bytes::new()),
        }
    }

    pub fn parts(&self) -> &[StoredPart] {
        match self {
            RequestBody::Parts(parts) => parts,
            _ => &[],
        }
    }

    pub fn part(&self, name: &str) -> Option<&StoredPart> {
        self.parts().iter().find(|part| part.name() == Some(name))
    }
}

/// Receives decoded body chunks as they come off the wire.
#[async_trait]
pub trait BodyFetcher: Send {
    async fn fetch(&mut self, chunk: Bytes) -> Result<(), ParseError>;

    /// Called once after the last chunk.
    async fn finish(&mut self) -> Result<(), ParseError> {
        Ok(())
    }
}

/// Writes to memory until a ceiling, then to a temp file.
#[derive(Debug)]
struct Spill {
    max_heap: u64,
    memory: BytesMut,
    file: Option<(TempFile, File)>,
}

impl Spill {
    fn new(max_heap: u64) -> Self {
        Self { max_heap, memory: BytesMut::new(), file: None }
    }

    async fn write(&mut self, chunk: &[u8], dir: &Path) -> Result<(), ParseError> {
        if self.file.is_none() && (self.memory.len() + chunk.len()) as u64 > self.max_heap {
            let (mut temp, mut file) = TempFile::create(dir).await?;
            file.write_all(&self.memory).await?;
            temp.len = self.memory.len() as u64;
            self.memory = BytesMut::new();
            self.file = Some((temp, file));
        }

        match &mut self.file {
            Some((temp, file)) => {
                file.write_all(chunk).await?;
                temp.len += chunk.len() as u64;
            }
            None => self.memory.extend_from_slice(chunk),
        }
        Ok(())
    }

    fn spilled(&self) -> bool {
        self.file.is_some()
    }

    async fn into_data(self) -> Result<PartData, ParseError> {
        match self.file {
            Some((temp, mut file)) => {
                file.flush().await?;
                Ok(PartData::File(temp))
            }
            None => Ok(PartData::Memory(self.memory.freeze())),
        }
    }
}

/// The default fetcher: keeps the body in memory up to the heap ceiling, then spills to disk.
#[derive(Debug)]
pub struct BodyCollector {
    limits: RouteLimits,
    spill: Spill,
}

impl BodyCollector {
    pub fn new(limits: RouteLimits) -> Self {
        let spill = Spill::new(limits.max_heap_buffer);
        Self { limits, spill }
    }

    /// Whether the body went past the heap ceiling.
    pub fn spilled(&self) -> bool {
        self.spill.spilled()
    }

    pub async fn into_body(self) -> Result<RequestBody, ParseError> {
        Ok(match self.spill.into_data().await? {
            PartData::File(file) => RequestBody::File(file),
            PartData::Memory(bytes) if bytes.is_empty() => RequestBody::Empty,
            PartData::Memory(bytes) => RequestBody::Memory(bytes),
        })
    }
}

#[async_trait]
impl BodyFetcher for BodyCollector {
    async fn fetch(&mut self, chunk: Bytes) -> Result<(), ParseError> {
        self.spill.write(&chunk, &self.limits.temp_dir).await
    }
}

/// Stores each part of a `multipart/form-data` body on its own.
#[derive(Debug)]
pub(crate) struct PartStore {
    limits: RouteLimits,
    decoder: MultipartDecoder,
    buf: BytesMut,
    current: Option<(PartHeader, Spill)>,
    parts: Vec<StoredPart>,
    spilled: bool,
}

impl PartStore {
    pub(crate) fn new(boundary: &str, limits: RouteLimits) -> Self {
        let decoder = MultipartDecoder::new(boundary).with_max_parts(limits.max_uploadable_resources);
        Self { limits, decoder, buf: BytesMut::new(), current: None, parts: Vec::new(), spilled: false }
    }

    pub(crate) fn spilled(&self) -> bool {
        self.spilled
    }

    pub(crate) async fn feed(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        self.buf.extend_from_slice(chunk);
        while let Some(item) = self.decoder.decode(&mut self.buf)? {
            self.apply(item).await?;
        }
        Ok(())
    }

    pub(crate) async fn finish(mut self) -> Result<Vec<StoredPart>, ParseError> {
        while let Some(item) = self.decoder.decode_eof(&mut self.buf)? {
            self.apply(item).await?;
        }
        ensure!(self.decoder.is_complete(), ParseError::invalid_multipart("body ended before the closing boundary"));
        Ok(self.parts)
    }

    async fn apply(&mut self, item: MultipartItem) -> Result<(), ParseError> {
        match item {
            MultipartItem::PartBegin(header) => {
                trace!(name = ?header.name(), filename = ?header.filename(), "storing multipart part");
                self.current = Some((header, Spill::new(self.limits.max_heap_buffer)));
            }
            MultipartItem::Data(data) => {
                if let Some((_, spill)) = &mut self.current {
                    spill.write(&data, &self.limits.temp_dir).await?;
                }
            }
            MultipartItem::PartEnd => {
                if let Some((header, spill)) = self.current.take() {
                    self.spilled |= spill.spilled();
                    let data = spill.into_data().await?;
                    self.parts.push(StoredPart { header, data });
                }
            }
            MultipartItem::Eof => {}
        }
        Ok(())
    }
}
