use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid server address {address:?}: URL scheme (http/https) is missing")]
    MissingScheme { address: String },

    #[error("invalid server address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        source: url::ParseError,
    },

    #[error("model name must not be empty")]
    EmptyModelName,

    #[error("failed to connect to the Ollama server at {url}")]
    Connection { url: Url, source: reqwest::Error },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: Url, timeout: Duration },

    #[error("HTTP error {status} from Ollama server{}", format_detail(.detail))]
    Protocol {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("failed to decode JSON response from {url}: {source}")]
    Decode {
        url: Url,
        source: serde_json::Error,
    },

    #[error("unexpected error talking to {url}: {source}")]
    Unexpected { url: Url, source: reqwest::Error },
}

/// Coarse classification of an [`Error`],
/// used by callers that only care about the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Connection,
    Timeout,
    Protocol,
    Decode,
    Unexpected,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingScheme { .. } | Error::InvalidAddress { .. } | Error::EmptyModelName => {
                ErrorKind::Configuration
            }
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Protocol { .. } => ErrorKind::Protocol,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// Sort a [`reqwest::Error`] into the taxonomy.
    /// Timeouts are checked first since a connect timeout
    /// also reports itself as a connection error.
    pub(crate) fn from_reqwest(url: &Url, timeout: Duration, source: reqwest::Error) -> Self {
        let url = url.clone();
        if source.is_timeout() {
            Error::Timeout { url, timeout }
        } else if source.is_connect() {
            Error::Connection { url, source }
        } else if let Some(status) = source.status() {
            Error::Protocol {
                status,
                detail: None,
            }
        } else {
            Error::Unexpected { url, source }
        }
    }
}

fn format_detail(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|detail| format!(": Details: {detail}"))
        .unwrap_or_default()
}
