use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config::ServiceConfig;
use crate::errors::Error;
use crate::headers::HeaderSet;
use crate::logging::ExchangeSummary;

pub type Parameters = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestMethod::Get => "GET",
            RestMethod::Post => "POST",
            RestMethod::Put => "PUT",
            RestMethod::Delete => "DELETE",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            RestMethod::Get => reqwest::Method::GET,
            RestMethod::Post => reqwest::Method::POST,
            RestMethod::Put => reqwest::Method::PUT,
            RestMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for RestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How parameters travel with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterEncoding {
    #[default]
    QueryString,
    Form,
    Json,
}

/// Fully prepared request handed to the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: RestMethod,
    pub url: String,
    pub parameters: Parameters,
    pub encoding: ParameterEncoding,
    pub headers: HeaderSet,
}

#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: HeaderSet,
    pub body: Bytes,
}

/// Result of one exchange.
///
/// `response` is `None` when no HTTP response was ever received. `outcome`
/// holds the accepted body, or the rejection cause when one is known.
#[derive(Debug)]
pub struct TransportResponse {
    pub summary: ExchangeSummary,
    pub response: Option<ResponseParts>,
    pub outcome: Result<Bytes, Option<Error>>,
}

/// HTTP engine the service dispatches through.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: TransportRequest) -> TransportResponse;
}

/// reqwest-backed transport. Accepts a response only when the status is 2xx
/// and its content type is one of `valid_content_types`.
pub struct ReqwestTransport {
    client: Client,
    valid_content_types: Vec<String>,
}

impl ReqwestTransport {
    pub fn new(client: Client, valid_content_types: Vec<String>) -> Self {
        Self {
            client,
            valid_content_types,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, Error> {
        let mut builder = Client::builder().user_agent("network-service-rust/0.1.0");
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self::new(builder.build()?, config.valid_content_types.clone()))
    }

    fn build(&self, request: &TransportRequest) -> Result<reqwest::Request, Error> {
        let mut builder = self
            .client
            .request(request.method.to_reqwest(), request.url.as_str());
        for (key, value) in request.headers.iter() {
            builder = builder.header(key, value);
        }
        if !request.parameters.is_empty() {
            builder = match request.encoding {
                ParameterEncoding::QueryString => builder.query(&string_pairs(&request.parameters)),
                ParameterEncoding::Form => builder.form(&string_pairs(&request.parameters)),
                ParameterEncoding::Json => builder.json(&request.parameters),
            };
        }
        Ok(builder.build()?)
    }

    fn validate(&self, status: StatusCode, content_type: Option<&str>, body: &Bytes) -> Result<(), Error> {
        if !status.is_success() {
            return Err(Error::Status(
                status,
                String::from_utf8_lossy(body).into_owned(),
            ));
        }
        // Empty bodies carry no content type worth checking.
        if body.is_empty() {
            return Ok(());
        }
        let accepted = content_type
            .is_some_and(|ct| accepts_content_type(&self.valid_content_types, ct));
        if accepted {
            Ok(())
        } else {
            Err(Error::ContentType(content_type.map(str::to_string)))
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: TransportRequest) -> TransportResponse {
        let mut summary = ExchangeSummary::started_now();
        summary.url = Some(request.url.clone());
        summary.method = Some(request.method.to_string());
        summary.request_headers = Some(request.headers.clone());
        let start = Instant::now();

        let built = match self.build(&request) {
            Ok(built) => built,
            Err(err) => {
                return TransportResponse {
                    summary,
                    response: None,
                    outcome: Err(Some(err)),
                };
            }
        };
        summary.record_request(&built);

        let resp = match self.client.execute(built).await {
            Ok(resp) => resp,
            Err(err) => {
                summary.elapsed = start.elapsed();
                return TransportResponse {
                    summary,
                    response: None,
                    outcome: Err(Some(Error::Http(err))),
                };
            }
        };

        let status = resp.status();
        let headers = header_set(resp.headers());
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let (body, outcome) = match resp.bytes().await {
            Ok(body) => {
                let outcome = self
                    .validate(status, content_type.as_deref(), &body)
                    .map(|_| body.clone())
                    .map_err(Some);
                (body, outcome)
            }
            Err(err) => (Bytes::new(), Err(Some(Error::Http(err)))),
        };
        summary.record_response(&headers, &body);
        summary.elapsed = start.elapsed();

        TransportResponse {
            summary,
            response: Some(ResponseParts {
                status,
                headers,
                body,
            }),
            outcome,
        }
    }
}

fn string_pairs(parameters: &Parameters) -> Vec<(String, String)> {
    parameters
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

fn header_set(headers: &HeaderMap) -> HeaderSet {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

fn accepts_content_type(acceptable: &[String], content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let Some((kind, _)) = mime.split_once('/') else {
        return false;
    };
    acceptable.iter().any(|candidate| {
        let candidate = candidate.to_ascii_lowercase();
        candidate == "*/*" || candidate == mime || candidate == format!("{kind}/*")
    })
}
