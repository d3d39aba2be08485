use crate::feed::FeedKey;
use thiserror::Error;
use warp::http::StatusCode;

/// Why a feed could not be served
///
/// Cloned into every caller waiting on the same upstream fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("no upstream credential configured")]
    MissingCredential,
    #[error("upstream answered with status {status}")]
    UpstreamHttp { status: u16 },
    #[error("upstream did not answer in time")]
    UpstreamTimeout,
    #[error("upstream request failed: {0}")]
    UpstreamTransport(String),
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),
    #[error("malformed realtime feed: {0}")]
    MalformedFeed(String),
    #[error("no table named {0}")]
    TableNotFound(FeedKey),
    #[error("fetch pipeline aborted")]
    PipelineAborted,
}

impl FeedError {
    /// Status answered to the client; the body is always empty
    pub fn status_code(&self) -> StatusCode {
        match self {
            FeedError::TableNotFound(_) => StatusCode::NOT_FOUND,
            FeedError::PipelineAborted => StatusCode::INTERNAL_SERVER_ERROR,
            FeedError::MissingCredential
            | FeedError::UpstreamHttp { .. }
            | FeedError::UpstreamTimeout
            | FeedError::UpstreamTransport(_)
            | FeedError::CorruptArchive(_)
            | FeedError::MalformedFeed(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FeedError::UpstreamTimeout
        } else if let Some(status) = e.status() {
            FeedError::UpstreamHttp {
                status: status.as_u16(),
            }
        } else {
            FeedError::UpstreamTransport(e.to_string())
        }
    }
}

impl From<gtfs_tables::Error> for FeedError {
    fn from(e: gtfs_tables::Error) -> Self {
        match e {
            gtfs_tables::Error::CorruptArchive(e) => FeedError::CorruptArchive(e.to_string()),
            gtfs_tables::Error::MalformedFeed(e) => FeedError::MalformedFeed(e.to_string()),
            other => FeedError::CorruptArchive(other.to_string()),
        }
    }
}
