#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use network_service::logging::ExchangeSummary;
use network_service::transport::{ResponseParts, TransportRequest, TransportResponse};
use network_service::{ActivityIndicator, Error, HeaderSet, Transport};
use reqwest::StatusCode;
use tracing::Level;
use tracing::subscriber::{DefaultGuard, set_default};

/// Collects formatted events from the current thread while alive.
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    _guard: DefaultGuard,
}

#[derive(Clone)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    pub fn start() -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = SharedBuffer(buffer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(Level::TRACE)
            .with_target(false)
            .with_ansi(false)
            .finish();
        Self {
            buffer,
            _guard: set_default(subscriber),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

#[derive(Default)]
pub struct CountingIndicator {
    pub shown: AtomicUsize,
    pub hidden: AtomicUsize,
}

impl CountingIndicator {
    pub fn shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }

    pub fn hidden(&self) -> usize {
        self.hidden.load(Ordering::SeqCst)
    }
}

impl ActivityIndicator for CountingIndicator {
    fn show(&self, _label: Option<&str>) {
        self.shown.fetch_add(1, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
    }

    fn is_already_showing(&self) -> bool {
        self.shown() > self.hidden()
    }
}

/// How a scripted exchange should end.
#[derive(Clone, Copy, Debug)]
pub enum Script {
    Success,
    Undecodable,
    Rejected,
    NoResponse,
    MissingCause,
}

/// Transport whose answer is picked from the request's `X-Script` header.
/// The summary URL keeps JSON-escaped slashes, as some servers echo it.
#[derive(Default)]
pub struct ScriptedTransport {
    pub calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn header_for(script: Script) -> String {
        format!("{:?}", script)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: TransportRequest) -> TransportResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let mut summary = ExchangeSummary::started_now();
        summary.url = Some(request.url.replace('/', "\\/"));
        summary.method = Some(request.method.to_string());
        let answered = |body: &'static str, outcome: Result<Bytes, Option<Error>>| TransportResponse {
            summary: summary.clone(),
            response: Some(ResponseParts {
                status: StatusCode::OK,
                headers: HeaderSet::new(),
                body: Bytes::from_static(body.as_bytes()),
            }),
            outcome,
        };
        match request.headers.get("X-Script").unwrap_or("Success") {
            "Success" => answered("{\"id\": 1}", Ok(Bytes::from_static(b"{\"id\": 1}"))),
            "Undecodable" => answered("[]", Ok(Bytes::from_static(b"[]"))),
            "Rejected" => answered(
                "",
                Err(Some(Error::Status(StatusCode::BAD_REQUEST, String::new()))),
            ),
            "MissingCause" => answered("", Err(None)),
            _ => TransportResponse {
                summary: summary.clone(),
                response: None,
                outcome: Err(None),
            },
        }
    }
}
