//! Minimal scripted HTTP/1.1 server for tests.
//!
//! Every connection gets one response: the next scripted one, else the
//! fallback, else a 503. Requests are recorded by their request line.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A synthetic snow report page with one row per measurement
pub const FIXTURE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Snow data</title></head>
<body>
  <section class="snow-data">
    <div class="snow-data-row">
      <p class="label">Snow in altitude</p>
      <p class="data">120 cm</p>
    </div>
    <div class="snow-data-row">
      <p class="label">Snow in the village</p>
      <p class="data">30 cm</p>
    </div>
    <div class="snow-data-row">
      <p class="label">Last snowfall 17.12.2025</p>
      <p class="data">15 cm</p>
    </div>
    <div class="snow-data-row">
      <p class="label">Fresh snow</p>
      <p class="data">5 cm</p>
    </div>
    <div class="snow-data-row">
      <p class="label">Cross-country skiing</p>
      <p class="data">98 km</p>
    </div>
    <div class="snow-data-row">
      <p class="label">Alpine skiing</p>
      <p class="data">115 km</p>
    </div>
    <div class="snow-data-row">
      <p class="label">Winter trail</p>
      <p class="data">12 km</p>
    </div>
  </section>
  <div class="webcam"><img src="/webcam/panorama.jpg" alt="Panorama"></div>
</body>
</html>"#;

#[derive(Clone, Debug)]
pub struct StubResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl StubResponse {
    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.as_bytes().to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn image(body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: "image/jpeg",
            body: body.to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn bytes(body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: "text/html",
            body: body.to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: b"stub error".to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct Shared {
    script: VecDeque<StubResponse>,
    fallback: Option<StubResponse>,
    requests: Vec<String>,
}

pub struct StubServer {
    addr: SocketAddr,
    shared: Arc<Mutex<Shared>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Should bind stub server");
        let addr = listener.local_addr().expect("Should have a local address");
        let shared = Arc::new(Mutex::new(Shared::default()));

        let task = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    tokio::spawn(serve(socket, Arc::clone(&shared)));
                }
            }
        });

        Self { addr, shared, task }
    }

    /// Queue one response
    pub fn push(&self, response: StubResponse) -> &Self {
        self.shared.lock().unwrap().script.push_back(response);
        self
    }

    /// Response used once the script is exhausted
    pub fn set_fallback(&self, response: StubResponse) {
        self.shared.lock().unwrap().fallback = Some(response);
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.shared.lock().unwrap().requests.len()
    }

    /// Request lines seen so far, e.g. `GET /cam.jpg HTTP/1.1`
    pub fn requests(&self) -> Vec<String> {
        self.shared.lock().unwrap().requests.clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut socket: TcpStream, shared: Arc<Mutex<Shared>>) {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }

    let request_line = String::from_utf8_lossy(&head)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();

    let response = {
        let mut shared = shared.lock().unwrap();
        shared.requests.push(request_line);
        match shared.script.pop_front() {
            Some(response) => response,
            None => shared
                .fallback
                .clone()
                .unwrap_or_else(|| StubResponse::status(503)),
        }
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let head = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.content_type,
        response.body.len()
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(&response.body).await;
    let _ = socket.shutdown().await;
}
