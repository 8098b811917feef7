//! Error taxonomy shared by every adapter and the pipeline engine.
//!
//! One variant per failure kind named in the design: adapters return
//! `Result<T, Error>` and the engine stringifies whichever variant it gets
//! into `Step.error` without needing to downcast.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum Error {
    #[error("{service} returned {status}: {body}")]
    RemoteFailure {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("transport failure calling {service}: {cause}")]
    TransportFailure { service: &'static str, cause: String },

    #[error("failed to parse {service} response: {detail}")]
    ParseFailure { service: &'static str, detail: String },

    #[error("invalid {field}: {detail}")]
    InvalidInput { field: &'static str, detail: String },

    #[error("missing implementation for step: {step_type}")]
    MissingImplementation { step_type: &'static str },

    #[error("timeout after waiting for {service}")]
    Timeout { service: &'static str },
}

impl Error {
    pub fn invalid_channel_url(detail: impl Into<String>) -> Self {
        Error::InvalidInput {
            field: "channel_url",
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout { service: "http" }
        } else if e.is_decode() {
            Error::ParseFailure {
                service: "http",
                detail: e.to_string(),
            }
        } else {
            Error::TransportFailure {
                service: "http",
                cause: e.to_string(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
