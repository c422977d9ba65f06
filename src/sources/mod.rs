use std::{fmt, io::ErrorKind};

mod auth;
mod file;
mod http;
mod memory;
mod s3;

pub use file::FileSource;
pub use http::HttpSource;
pub use memory::MemorySource;
pub use s3::S3Source;
use std::collections::HashMap;

use crate::errors::Error;
use std::io;
use tracing::debug;

enum SourceKind {
    File(FileSource),
    Http(HttpSource),
    S3(S3Source),
    Memory(MemorySource),
}

impl fmt::Debug for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(_) => f.debug_tuple("File").finish(),
            Self::Http(s) => f.debug_tuple("Http").field(&s.url()).finish(),
            Self::S3(s) => f.debug_tuple("S3").field(&s.url()).finish(),
            Self::Memory(_) => f.debug_tuple("Memory").finish(),
        }
    }
}

impl SourceKind {
    /// This tries to read the given buffer at the given offset. If EOF is reached, this will
    /// return Ok(n) where n < buf.len()
    async fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        match self {
            SourceKind::File(s) => s.read(offset, buf).await,
            SourceKind::Http(s) => s.read(offset, buf).await,
            SourceKind::S3(s) => s.read(offset, buf).await,
            SourceKind::Memory(s) => s.read(offset, buf).await,
        }
    }

    /// Reads exactly the given buffer from the given offset. This returns an Err(ErrorKind::UnexpectedEof)
    /// if Eof is reached while reading. If this returns Ok(), it is guaranteed the whole buffer has been read
    /// See https://docs.rs/tokio/latest/tokio/io/trait.AsyncReadExt.html#method.read_exact
    pub async fn read_exact(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let bytes_count = self.read(offset, buf).await?;
        if bytes_count < buf.len() {
            Err(Error::IO(io::Error::from(ErrorKind::UnexpectedEof)))
        } else {
            Ok(())
        }
    }

    pub fn get_stats(&self) -> String {
        match self {
            SourceKind::File(s) => s.get_stats(),
            SourceKind::Http(s) => s.get_stats(),
            SourceKind::S3(s) => s.get_stats(),
            SourceKind::Memory(s) => s.get_stats(),
        }
    }
}

const CHUNK_SIZE: usize = 16384; // 16 kB, like GDAL `CPL_VSIL_CURL_CHUNK_SIZE`

const MAX_CACHED_CHUNKS: usize = 100;

/// Sources support chunked reading mode with caching and direct reading.
/// - Chunked reading with caching should be used to read the header + IFDs
/// - Direct reading should be used to read tile data
///
/// A COG packs its IFDs at the start of the file, so reading them through 16 kB chunks
/// usually costs one or two range requests. Tile data on the other hand is read with
/// exactly one request per tile, since we know its offset and byte count.
struct ChunkCache {
    // Maps a chunk index to the chunk data. Note that the last chunk will still have CHUNK_SIZE
    // data, but data past `source_len` will be filled with 0
    chunks_cache: HashMap<u64, Box<[u8; CHUNK_SIZE]>>,
    // Once we have reached EOF, we store the source len here
    source_len: Option<u64>,
}

impl fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkCache")
            .field("cached_chunks", &self.chunks_cache.len())
            .field("source_len", &self.source_len)
            .finish()
    }
}

impl ChunkCache {
    pub fn new() -> Self {
        ChunkCache {
            chunks_cache: HashMap::new(),
            source_len: None,
        }
    }

    async fn read_chunk(
        &mut self,
        source_kind: &mut SourceKind,
        chunk_index: u64,
    ) -> Result<&[u8; CHUNK_SIZE], Error> {
        if !self.chunks_cache.contains_key(&chunk_index)
            && self.chunks_cache.len() >= MAX_CACHED_CHUNKS
        {
            // No LRU here, we evict an arbitrary chunk
            if let Some(key) = self.chunks_cache.keys().next().copied() {
                self.chunks_cache.remove(&key);
            }
        }

        match self.chunks_cache.entry(chunk_index) {
            std::collections::hash_map::Entry::Occupied(e) => Ok(&**e.into_mut()),
            std::collections::hash_map::Entry::Vacant(e) => {
                let mut chunk = Box::new([0u8; CHUNK_SIZE]);
                let read_count = source_kind
                    .read(chunk_index * CHUNK_SIZE as u64, &mut chunk[..])
                    .await?;
                if read_count < chunk.len() {
                    // A short read means EOF. We don't support sources that grow while we read them,
                    // so the first EOF we get is the true EOF
                    let chunk_len = chunk_index * CHUNK_SIZE as u64 + read_count as u64;
                    match self.source_len {
                        Some(source_len) if source_len != chunk_len => {
                            return Err(Error::SourceError(format!(
                                "Inconsistent EOF (previous source_len={}), now read_count={} at chunk_index={}",
                                source_len, read_count, chunk_index
                            )));
                        }
                        _ => self.source_len = Some(chunk_len),
                    }
                }
                Ok(&**e.insert(chunk))
            }
        }
    }

    pub async fn read_exact(
        &mut self,
        source_kind: &mut SourceKind,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        if buf.is_empty() {
            return Ok(());
        }
        let end = offset + buf.len() as u64;
        let start_chunk = offset / CHUNK_SIZE as u64;
        let end_chunk = (end - 1) / CHUNK_SIZE as u64;
        let mut buf_offset = 0;
        for chunk_id in start_chunk..=end_chunk {
            let chunk_start_offset = chunk_id * CHUNK_SIZE as u64;
            let chunk = self.read_chunk(source_kind, chunk_id).await?;

            let chunk_from = offset.saturating_sub(chunk_start_offset) as usize;
            let chunk_to = std::cmp::min(end - chunk_start_offset, CHUNK_SIZE as u64) as usize;
            let read_count = chunk_to - chunk_from;
            buf[buf_offset..buf_offset + read_count].copy_from_slice(&chunk[chunk_from..chunk_to]);

            // Read past EOF check
            if let Some(source_len) = self.source_len {
                if end > source_len {
                    return Err(Error::SourceError(format!(
                        "Trying to read past EOF (source_len={}), offset + buf.len() = {}",
                        source_len, end
                    )));
                }
            }
            buf_offset += read_count;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Source {
    kind: SourceKind,
    cache: ChunkCache,
}

fn strip_vsi_prefix<'a>(source_spec: &'a str, prefix: &str) -> Option<&'a str> {
    source_spec.strip_prefix(prefix).filter(|s| !s.is_empty())
}

impl Source {
    fn new(kind: SourceKind) -> Source {
        Source {
            kind,
            cache: ChunkCache::new(),
        }
    }

    pub fn from_memory(buffer: Vec<u8>) -> Source {
        Source::new(SourceKind::Memory(MemorySource::new(buffer)))
    }

    /// Opens a source from a GDAL-like source spec:
    /// - `http://...`, `https://...` or `/vsicurl/http...` for plain HTTP range requests
    /// - `s3://bucket/key` or `/vsis3/bucket/key` for S3 (or S3-compatible) object storage
    /// - anything else is interpreted as a local file path
    pub async fn new_from_source_spec(source_spec: &str) -> Result<Source, Error> {
        let kind = if let Some(url) = strip_vsi_prefix(source_spec, "/vsicurl/") {
            SourceKind::Http(HttpSource::new(url)?)
        } else if source_spec.starts_with("http://") || source_spec.starts_with("https://") {
            SourceKind::Http(HttpSource::new(source_spec)?)
        } else if let Some(path) = strip_vsi_prefix(source_spec, "/vsis3/")
            .or_else(|| strip_vsi_prefix(source_spec, "s3://"))
        {
            SourceKind::S3(S3Source::new(path)?)
        } else {
            SourceKind::File(FileSource::new(source_spec).await?)
        };
        debug!(source_spec, kind = ?kind, "opened source");
        Ok(Source::new(kind))
    }

    // Read going through the chunk cache
    pub async fn read_exact(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.cache.read_exact(&mut self.kind, offset, buf).await
    }

    // Read bypassing the chunk cache
    pub async fn read_exact_direct(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.kind.read_exact(offset, buf).await
    }

    pub fn get_stats(&self) -> String {
        self.kind.get_stats()
    }
}
