use crate::errors::Error;
use std::io::SeekFrom;
use tokio::{fs::File, io::AsyncReadExt, io::AsyncSeekExt};

#[derive(Default)]
struct Stats {
    read_counts: usize,
}

pub struct FileSource {
    file: File,
    filename: String,
    stats: Stats,
}

impl FileSource {
    pub async fn new(filename: &str) -> Result<FileSource, Error> {
        let file = File::open(filename).await.map_err(|e| {
            Error::ResourceUnavailable(format!("failed to open {}: {}", filename, e))
        })?;
        Ok(FileSource {
            file,
            filename: filename.to_string(),
            stats: Default::default(),
        })
    }

    /// Like `AsyncReadExt::read`, but loops until `buf` is full or EOF is reached
    pub async fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| self.unavailable(e))?;
        self.stats.read_counts += 1;
        let mut total = 0;
        while total < buf.len() {
            let n = self
                .file
                .read(&mut buf[total..])
                .await
                .map_err(|e| self.unavailable(e))?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    fn unavailable(&self, e: std::io::Error) -> Error {
        Error::ResourceUnavailable(format!("failed to read {}: {}", self.filename, e))
    }

    pub fn get_stats(&self) -> String {
        format!("read_counts={}", self.stats.read_counts)
    }
}
