use reqwest::StatusCode;
use thiserror::Error;

/// Ошибки обращения к API социальной сети (XRPC)
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("unexpected response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },
    #[error("invalid request to {endpoint}: {message}")]
    InvalidRequest { endpoint: String, message: String },
    #[error("{endpoint} transport failed: {message}")]
    Transport { endpoint: String, message: String },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed {url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("feed is not well-formed xml: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("unsupported feed format: <{0}>")]
    UnsupportedFormat(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },
}

/// Ошибки подготовки и отправки одного поста
#[derive(Debug, Error)]
pub enum PostError {
    #[error("refusing to post empty text")]
    EmptyText,
    #[error("publisher has no session, login first")]
    NotAuthenticated,
    #[error("post template render failed: {0}")]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}
