use std::cmp::min;

use crate::errors::Error;
use bytes::Buf;
use reqwest::header::RANGE;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;

#[derive(Debug, Default)]
struct Stats {
    read_counts: usize,
}

/// Reads a remote file through HTTP range requests. The server must support them
pub struct HttpSource {
    client: Client,
    url: String,
    stats: Stats,
}

impl HttpSource {
    pub fn new(url: &str) -> Result<HttpSource, Error> {
        let client = Client::builder().build()?;
        Ok(HttpSource {
            client,
            url: url.to_string(),
            stats: Default::default(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        self.stats.read_counts += 1;
        let request = self.client.get(&self.url);
        read_range(request, &self.url, offset, buf).await
    }

    pub fn get_stats(&self) -> String {
        format!("read_counts={}", self.stats.read_counts)
    }
}

/// Sends `request` with a `Range` header covering `buf` and copies the response body into it.
/// Returns the number of bytes copied, which is less than `buf.len()` when reading past EOF
pub(super) async fn read_range(
    request: RequestBuilder,
    url: &str,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize, Error> {
    if buf.is_empty() {
        return Ok(0);
    }
    // HTTP ranges are inclusive
    let last = offset + buf.len() as u64 - 1;
    debug!(url, offset, len = buf.len(), "range request");
    let resp = request
        .header(RANGE, format!("bytes={}-{}", offset, last))
        .send()
        .await?;
    let status = resp.status();
    // We check for explicit 206 (Partial Content) because if the server would not support range
    // requests, it could just reply with 200 and the whole document, which defeats the purpose
    // of reading a COG.
    // A partial read past EOF still gets a 206 with the data up to EOF, which is handled by the
    // copy below. A read starting past EOF gets a 416
    let mut body = if status == StatusCode::PARTIAL_CONTENT {
        resp.bytes().await?
    } else if status == StatusCode::RANGE_NOT_SATISFIABLE {
        return Ok(0);
    } else {
        return Err(Error::ResourceUnavailable(format!(
            "Range request on {} failed, code={}: {}",
            url,
            status.as_u16(),
            resp.text().await.unwrap_or_default(),
        )));
    };

    let len_to_copy = min(body.remaining(), buf.len());
    body.copy_to_slice(&mut buf[0..len_to_copy]);
    Ok(len_to_copy)
}
