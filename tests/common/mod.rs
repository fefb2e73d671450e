//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;

use geocode_pipeline::geocoder::{
    Address, GeocodeError, Geocoder, PlaceType, ProviderError, ProviderErrorKind, SearchFuture,
    SearchOptions,
};
use geocode_pipeline::pipeline::{Pipeline, PipelineSettings};
use geocode_pipeline::resilience::QueueSettings;

#[derive(Clone)]
pub enum Reply {
    Found(Address),
    NotFound,
    Fail,
}

/// In-process provider with a fixed answer table and a call counter.
pub struct MockProvider {
    name: String,
    replies: HashMap<String, Reply>,
    calls: AtomicUsize,
    gate: Option<watch::Receiver<bool>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: HashMap::new(),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn reply(mut self, query: &str, reply: Reply) -> Self {
        self.replies.insert(query.to_string(), reply);
        self
    }

    /// Calls block until the returned sender publishes `true`.
    pub fn gated(mut self) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        self.gate = Some(rx);
        (self, tx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(&'a self, query: &'a str, _opts: &'a SearchOptions) -> SearchFuture<'a> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let mut gate = gate.clone();
                let _ = gate.wait_for(|open| *open).await;
            }
            match self.replies.get(query) {
                Some(Reply::Found(address)) => Ok(Some(address.clone())),
                Some(Reply::Fail) => Err(GeocodeError::Provider(ProviderError::new(
                    &self.name,
                    ProviderErrorKind::Transport,
                    "connection reset",
                ))),
                Some(Reply::NotFound) | None => Ok(None),
            }
        }
        .boxed()
    }
}

pub fn brazil(source: &str) -> Address {
    Address::new(source, "Brasil", PlaceType::Country, 0.89).with_country("Brasil", "br")
}

pub fn city(name: &str) -> Address {
    Address::new(name, name, PlaceType::City, 0.7)
}

/// Cache → LoadBalancer → Throttler over `providers`, all unthrottled.
pub fn pipeline(providers: &[Arc<MockProvider>]) -> Pipeline {
    let providers = providers
        .iter()
        .map(|p| (p.clone() as Arc<dyn Geocoder>, QueueSettings::default()))
        .collect();
    Pipeline::new(providers, PipelineSettings::default(), None).unwrap()
}

/// Wait until `condition` holds, polling briefly.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Start a programmable HTTP upstream on an ephemeral port.
///
/// `f` receives the request target (path + query) and returns status and body.
pub async fn start_programmable_upstream<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buf);
                let target = head
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let (status, body) = f(target).await;
                let status_text = match status {
                    200 => "200 OK",
                    403 => "403 Forbidden",
                    404 => "404 Not Found",
                    429 => "429 Too Many Requests",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
