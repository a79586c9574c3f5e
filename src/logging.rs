//! Exchange summaries and subscriber setup.

use std::time::Duration;

use bytes::Bytes;
use jiff::Timestamp;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::headers::HeaderSet;

#[cfg(debug_assertions)]
const DEFAULT_FILTER: &str = "debug";
#[cfg(not(debug_assertions))]
const DEFAULT_FILTER: &str = "warn";

/// Installs a fmt subscriber honouring `RUST_LOG`, defaulting to `debug` in
/// debug builds and `warn` otherwise. Later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// What was sent and received during one exchange, kept for the debug log.
#[derive(Clone, Debug)]
pub struct ExchangeSummary {
    pub url: Option<String>,
    pub method: Option<String>,
    pub request_headers: Option<HeaderSet>,
    pub query: Vec<(String, String)>,
    pub request_body: Option<Bytes>,
    pub response_headers: Option<HeaderSet>,
    pub response_body: Option<Bytes>,
    pub started_at: Timestamp,
    pub elapsed: Duration,
}

impl ExchangeSummary {
    pub fn started_now() -> Self {
        Self {
            url: None,
            method: None,
            request_headers: None,
            query: Vec::new(),
            request_body: None,
            response_headers: None,
            response_body: None,
            started_at: Timestamp::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn record_request(&mut self, request: &reqwest::Request) {
        self.url = Some(request.url().as_str().to_string());
        self.method = Some(request.method().as_str().to_string());
        self.request_headers = Some(
            request
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
                .collect(),
        );
        self.query = request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        self.request_body = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(Bytes::copy_from_slice);
    }

    pub fn record_response(&mut self, headers: &HeaderSet, body: &Bytes) {
        self.response_headers = Some(headers.clone());
        self.response_body = Some(body.clone());
    }

    /// Multi-section text block written at DEBUG level after each exchange.
    pub fn render(&self) -> String {
        let query = if self.query.is_empty() {
            None
        } else {
            let map: serde_json::Map<String, serde_json::Value> = self
                .query
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            serde_json::to_string_pretty(&map).ok()
        };
        let request_headers = self
            .request_headers
            .as_ref()
            .and_then(|h| serde_json::to_string_pretty(h).ok());
        let request_body = self
            .request_body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned());
        let response_headers = self
            .response_headers
            .as_ref()
            .and_then(|h| serde_json::to_string_pretty(h).ok());
        let response_body = self.response_body.as_ref().map(|b| pretty_body(b));

        format!(
            "\n\n******************************\n\
             - Service URL:\n{}\n\
             - Rest Method:\n{}\n\
             - Request Header:\n{}\n\
             - Request Parameters in Querystring:\n{}\n\
             - Request Parameters in Body:\n{}\n\
             - Response Header:\n{}\n\
             - Response Body:\n{}\n\
             ******************************\n",
            clean_for_debug(self.url.as_deref()),
            clean_for_debug(self.method.as_deref()),
            clean_for_debug(request_headers.as_deref()),
            clean_for_debug(query.as_deref()),
            clean_for_debug(request_body.as_deref()),
            clean_for_debug(response_headers.as_deref()),
            clean_for_debug(response_body.as_deref()),
        )
    }
}

fn pretty_body(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned()),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Unescapes `\/` and substitutes `<empty>` for missing values.
pub fn clean_for_debug(value: Option<&str>) -> String {
    value
        .map(|v| v.replace("\\/", "/"))
        .unwrap_or_else(|| "<empty>".to_string())
}

pub(crate) fn log_exchange(call_id: Uuid, summary: &ExchangeSummary) {
    debug!(
        call_id = %call_id,
        started_at = %summary.started_at,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "{}",
        summary.render()
    );
}
