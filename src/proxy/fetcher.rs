// src/proxy/fetcher.rs
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;

/// Upstream body, yielded chunk by chunk. Dropping it closes the upstream connection.
pub type BodyStream = BoxStream<'static, Result<Bytes, FetchError>>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no response headers within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("no body data received for {0:?}")]
    IdleTimeout(Duration),
}

/// A live upstream response with only the parts the proxy forwards.
pub struct Fetched {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub content_length: Option<HeaderValue>,
    pub body: BodyStream,
}

impl fmt::Debug for Fetched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetched")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// GETs the resolved URL on a fresh connection every time.
pub struct HttpFetcher {
    client: Client,
    header_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
}

impl HttpFetcher {
    /// `timeout` bounds both connecting and waiting for response headers; the body
    /// is only bounded by `idle_timeout`, if set.
    pub fn new(
        timeout: Option<Duration>,
        idle_timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().pool_max_idle_per_host(0);
        if let Some(timeout) = timeout {
            builder = builder.connect_timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            header_timeout: timeout,
            idle_timeout,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let request = self.client.get(url).header(CONNECTION, "close").send();

        let response = match self.header_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| FetchError::Timeout(limit))??,
            None => request.await?,
        };

        let headers = response.headers();
        let content_type = headers.get(CONTENT_TYPE).cloned();
        let content_length = headers.get(CONTENT_LENGTH).cloned();
        let status = response.status();

        let body = response.bytes_stream().map_err(FetchError::Transport).boxed();

        Ok(Fetched {
            status,
            content_type,
            content_length,
            body: with_idle_timeout(body, self.idle_timeout),
        })
    }
}

/// End the stream with [`FetchError::IdleTimeout`] if no chunk arrives within `idle`.
pub fn with_idle_timeout(body: BodyStream, idle: Option<Duration>) -> BodyStream {
    let Some(idle) = idle else {
        return body;
    };

    stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => Some((Err(FetchError::IdleTimeout(idle)), None)),
        }
    })
    .boxed()
}
