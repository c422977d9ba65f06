//! A small HTTP/1.1 server on a local port, serving one buffer on every path
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the server answers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    /// 206 with the requested range, 416 for a range starting at or past the end, 200 with
    /// the whole buffer when there is no `Range` header
    Ranges,
    /// Always this status, ignoring `Range`. A 200 carries the whole buffer
    Status(u16),
    /// Accepts connections and reads requests but never answers them
    Silent,
}

pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Must be called from within a tokio runtime
    pub async fn start(data: Vec<u8>, reply: Reply) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let data = Arc::new(data);
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_connection(
                    stream,
                    data.clone(),
                    reply,
                    counter.clone(),
                ));
            }
        });
        TestServer {
            addr,
            requests,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path)
    }

    /// Requests received so far, answered or not
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// Reads up to the blank line ending the request head. Bytes past it stay in `buf`
async fn read_head(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<String> {
    loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head: Vec<u8> = buf.drain(..pos + 4).collect();
            return Some(String::from_utf8_lossy(&head).into_owned());
        }
        let mut chunk = [0u8; 1024];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Parses `Range: bytes=start-[end]`
fn requested_range(head: &str) -> Option<(usize, Option<usize>)> {
    let value = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("range")
            .then(|| value.trim())
    })?;
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()))
}

fn response(code: u16, headers: &[String], body: &[u8]) -> Vec<u8> {
    let reason = match code {
        200 => "OK",
        206 => "Partial Content",
        404 => "Not Found",
        416 => "Range Not Satisfiable",
        _ => "Other",
    };
    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n",
        code,
        reason,
        body.len()
    );
    for header in headers {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

async fn serve_connection(
    mut stream: TcpStream,
    data: Arc<Vec<u8>>,
    reply: Reply,
    requests: Arc<AtomicUsize>,
) {
    let mut buf = Vec::new();
    while let Some(head) = read_head(&mut stream, &mut buf).await {
        requests.fetch_add(1, Ordering::SeqCst);
        let out = match reply {
            Reply::Silent => {
                // Keeps the connection open without ever answering
                std::future::pending::<()>().await;
                return;
            }
            Reply::Status(200) => response(200, &[], &data),
            Reply::Status(code) => response(code, &[], b"no such object"),
            Reply::Ranges => match requested_range(&head) {
                None => response(200, &[], &data),
                Some((start, _)) if start >= data.len() => response(
                    416,
                    &[format!("Content-Range: bytes */{}", data.len())],
                    &[],
                ),
                Some((start, end)) => {
                    let end = end.map_or(data.len() - 1, |e| e.min(data.len() - 1));
                    response(
                        206,
                        &[format!(
                            "Content-Range: bytes {}-{}/{}",
                            start,
                            end,
                            data.len()
                        )],
                        &data[start..=end],
                    )
                }
            },
        };
        if stream.write_all(&out).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_range() {
        let head = "GET /b.tif HTTP/1.1\r\nhost: 127.0.0.1\r\nrange: bytes=10-109\r\n\r\n";
        assert_eq!(requested_range(head), Some((10, Some(109))));
        assert_eq!(
            requested_range("GET / HTTP/1.1\r\nRange: bytes=5-\r\n\r\n"),
            Some((5, None))
        );
        assert_eq!(requested_range("GET / HTTP/1.1\r\n\r\n"), None);
    }
}
