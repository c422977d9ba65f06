use crate::errors::Error;

#[derive(Default)]
struct Stats {
    read_counts: usize,
}

/// In-memory source, mostly useful for tests
pub struct MemorySource {
    buffer: Vec<u8>,
    stats: Stats,
}

impl MemorySource {
    pub fn new(buffer: Vec<u8>) -> MemorySource {
        MemorySource {
            buffer,
            stats: Default::default(),
        }
    }

    /// See https://docs.rs/tokio/latest/tokio/io/trait.AsyncReadExt.html#method.read
    pub async fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        self.stats.read_counts += 1;
        let start = std::cmp::min(self.buffer.len(), offset as usize);
        let end = std::cmp::min(self.buffer.len(), start + buf.len());
        buf[..(end - start)].copy_from_slice(&self.buffer[start..end]);
        Ok(end - start)
    }

    pub fn get_stats(&self) -> String {
        format!("read_counts={}", self.stats.read_counts)
    }
}
