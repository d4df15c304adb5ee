//! Scripted WebSocket server for integration tests.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// What the server does on one connection, in order
#[derive(Debug, Clone)]
pub enum Step {
    Send(String),
    Sleep(Duration),
    /// Send a close frame with this code and stop
    Close(u16),
    /// Drop the TCP stream without a close frame
    Drop,
    /// Read frames until the client goes away
    Hold,
}

pub struct TestServer {
    pub addr: std::net::SocketAddr,
    /// Number of accepted WebSocket handshakes
    pub accepts: Arc<AtomicUsize>,
    /// Text frames received from clients
    pub received: Arc<Mutex<Vec<String>>>,
    /// Close codes received from clients
    pub closes: Arc<Mutex<Vec<Option<u16>>>>,
    /// Request paths (with query) of every handshake
    pub paths: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Connection `i` runs `scripts[min(i, len - 1)]`. With `max_accepts`, the listener
    /// closes after that many handshakes so later dials are refused.
    pub async fn start(scripts: Vec<Vec<Step>>, max_accepts: Option<usize>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accepts = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));
        let closes = Arc::new(Mutex::new(Vec::new()));
        let paths = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let accepts = Arc::clone(&accepts);
            let received = Arc::clone(&received);
            let closes = Arc::clone(&closes);
            let paths = Arc::clone(&paths);
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };

                    let path = Arc::new(std::sync::Mutex::new(String::new()));
                    let path_slot = Arc::clone(&path);
                    let callback = move |req: &Request, resp: Response| {
                        *path_slot.lock().unwrap() = req.uri().to_string();
                        Ok::<Response, ErrorResponse>(resp)
                    };
                    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                        continue;
                    };

                    let index = accepts.fetch_add(1, Ordering::SeqCst);
                    paths.lock().await.push(path.lock().unwrap().clone());
                    let script = scripts[index.min(scripts.len() - 1)].clone();
                    tokio::spawn(run_script(
                        ws,
                        script,
                        Arc::clone(&received),
                        Arc::clone(&closes),
                    ));

                    if max_accepts.is_some_and(|max| index + 1 >= max) {
                        break;
                    }
                }
            })
        };

        Self {
            addr,
            accepts,
            received,
            closes,
            paths,
            handle,
        }
    }

    /// Every connection just holds
    pub async fn holding() -> Self {
        Self::start(vec![vec![Step::Hold]], None).await
    }

    pub fn base_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_script(
    mut ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    script: Vec<Step>,
    received: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<Vec<Option<u16>>>>,
) {
    for step in script {
        match step {
            Step::Send(text) => {
                if ws.send(Message::text(text)).await.is_err() {
                    return;
                }
            }
            Step::Sleep(duration) => tokio::time::sleep(duration).await,
            Step::Close(code) => {
                let _ = ws
                    .close(Some(CloseFrame {
                        code: CloseCode::from(code),
                        reason: "closed by test".into(),
                    }))
                    .await;
                // Drain until the client acknowledges
                while let Some(Ok(_)) = ws.next().await {}
                return;
            }
            Step::Drop => return,
            Step::Hold => {
                while let Some(Ok(msg)) = ws.next().await {
                    match msg {
                        Message::Text(text) => received.lock().await.push(text.as_str().to_string()),
                        Message::Close(frame) => {
                            closes.lock().await.push(frame.map(|f| u16::from(f.code)));
                            break;
                        }
                        _ => {}
                    }
                }
                return;
            }
        }
    }
}

/// Polls `check` every 10ms until it holds or `timeout` passes
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
