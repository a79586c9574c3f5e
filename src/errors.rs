use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("network unreachable")]
    NetworkUnreachable,
    #[error("no response received: {0}")]
    NoResponse(String),
    #[error("error converting {type_name} object: {reason}")]
    Decode {
        type_name: &'static str,
        reason: String,
    },
    #[error("unacceptable status code {0}: {1}")]
    Status(StatusCode, String),
    #[error("unacceptable content type: {0:?}")]
    ContentType(Option<String>),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("error loading mock response '{0}'")]
    FixtureLoad(String),
    #[error("loaded failure mock response")]
    SimulatedFailure,
    #[error("internal error")]
    Internal,
    #[error("no async runtime available to run the call")]
    NoRuntime,
    #[error("malformed target '{0}'")]
    MalformedTarget(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error delivered to a call's error path.
///
/// `valid_response` is true when the exchange produced a response that was
/// then rejected, false when no usable response was ever reached.
#[derive(Debug, Error)]
#[error("{cause} (valid_response={valid_response})")]
pub struct CallError {
    pub cause: Error,
    pub valid_response: bool,
}

impl CallError {
    pub fn new(cause: Error, valid_response: bool) -> Self {
        Self {
            cause,
            valid_response,
        }
    }

    pub fn unreachable() -> Self {
        Self::new(Error::NetworkUnreachable, false)
    }
}

pub type CallResult<T> = Result<T, CallError>;
