//! Shared fixtures: a scripted HTTP origin on localhost and a recording reporter.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use attachment_sync::{AttachmentMetadata, ImagePipeline, PipelineError, Reporter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the origin answers one `METHOD path` pair.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Empty response with the given status.
    Status(u16),
    /// 200 with a complete body.
    Body(&'static [u8]),
    /// 200 announcing `declared` bytes, then closing after `sent`.
    Truncated {
        declared: usize,
        sent: &'static [u8],
    },
}

/// A tiny HTTP/1.1 server answering from a fixed route table.
///
/// Unknown routes get a 404. Every request line is recorded.
pub struct Origin {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Origin {
    pub async fn start(routes: Vec<(String, Reply)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind origin");
        let port = listener.local_addr().unwrap().port();
        let routes: Arc<HashMap<String, Reply>> = Arc::new(routes.into_iter().collect());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&routes), Arc::clone(&seen)));
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            requests,
        }
    }

    /// The remote uploads URL served by this origin.
    pub fn uploads_url(&self) -> String {
        format!("{}/app/uploads/", self.base_url)
    }

    /// Full URL of an uploads-relative file.
    pub fn url(&self, relative: &str) -> String {
        format!("{}{relative}", self.uploads_url())
    }

    /// Request lines received so far, e.g. `HEAD /app/uploads/a.jpg`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Route key for an uploads-relative file.
pub fn route(method: &str, relative: &str) -> String {
    format!("{method} /app/uploads/{relative}")
}

/// HEAD and GET routes that both answer with `reply`.
pub fn both(relative: &str, head: Reply, get: Reply) -> Vec<(String, Reply)> {
    vec![(route("HEAD", relative), head), (route("GET", relative), get)]
}

async fn serve(
    mut stream: TcpStream,
    routes: Arc<HashMap<String, Reply>>,
    requests: Arc<Mutex<Vec<String>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let request = String::from_utf8_lossy(&buf);
    let mut parts = request.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    let key = format!("{method} {path}");
    requests.lock().unwrap().push(key.clone());

    let reply = routes.get(&key).cloned().unwrap_or(Reply::Status(404));
    let (status, declared, body): (u16, usize, &[u8]) = match reply {
        Reply::Status(status) => (status, 0, &[] as &[u8]),
        Reply::Body(body) => (200, body.len(), body),
        Reply::Truncated { declared, sent } => (200, declared, sent),
    };

    let head = format!(
        "HTTP/1.1 {status} {}\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n",
        if status == 200 { "OK" } else { "Error" }
    );
    let _ = stream.write_all(head.as_bytes()).await;
    if method != "HEAD" {
        let _ = stream.write_all(body).await;
    }
    let _ = stream.shutdown().await;
}

/// Reporter that keeps every event as a string.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Reporter for Recorder {
    fn line(&self, message: &str) {
        self.push(format!("line: {message}"));
    }

    fn warning(&self, message: &str) {
        self.push(format!("warning: {message}"));
    }

    fn progress_start(&self, label: &str, total: u64) {
        self.push(format!("start: {label} {total}"));
    }

    fn progress_tick(&self) {
        self.push("tick".to_string());
    }

    fn progress_finish(&self) {
        self.push("finish".to_string());
    }

    fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        self.push(format!("table: {headers:?} {rows:?}"));
    }
}

/// Image pipeline that always returns one fixed size entry.
pub struct FixedSizes;

#[async_trait]
impl ImagePipeline for FixedSizes {
    async fn generate_sizes(
        &self,
        id: u64,
        local_path: &Path,
    ) -> Result<AttachmentMetadata, PipelineError> {
        let mut metadata = AttachmentMetadata::new();
        metadata.insert("id".into(), id.into());
        metadata.insert("file".into(), local_path.display().to_string().into());
        Ok(metadata)
    }
}
