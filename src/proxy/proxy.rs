// ────────────────────────────────
// src/proxy/proxy.rs
// Per-request orchestration: select a mirror, fetch from it, stream the body back.
// ────────────────────────────────

use super::fetcher::{FetchError, Fetcher, HttpFetcher};
use super::prober::{HttpProber, Prober};
use super::selector::HostSelector;
use crate::config::Config;
use crate::metrics::{MetricsCollector, Timer};
use hyper::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::{Body, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Client address, inserted into request extensions by the server loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

pub struct Proxy {
    selector: HostSelector,
    fetcher: Arc<dyn Fetcher>,
    metrics: Option<Arc<MetricsCollector>>,
}

/// Fields that identify a request in log lines.
#[derive(Debug, Clone)]
struct RequestInfo {
    method: String,
    host: String,
    path: String,
    remote: String,
}

impl RequestInfo {
    fn from_request(req: &Request<Body>) -> Self {
        let host = req
            .headers()
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| req.uri().authority().map(|a| a.to_string()))
            .unwrap_or_default();

        let remote = req
            .extensions()
            .get::<RemoteAddr>()
            .map(|addr| addr.0.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            method: req.method().to_string(),
            host,
            path: req.uri().path().to_string(),
            remote,
        }
    }
}

impl Proxy {
    /// Build a proxy that probes and fetches over HTTP using the configured timeouts.
    pub fn new(
        config: Arc<Config>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Result<Self, reqwest::Error> {
        let prober = Arc::new(HttpProber::new(config.timeout())?);
        let fetcher = Arc::new(HttpFetcher::new(config.timeout(), config.idle_timeout())?);

        Ok(Self::with_parts(&config, prober, fetcher, metrics))
    }

    pub fn with_parts(
        config: &Config,
        prober: Arc<dyn Prober>,
        fetcher: Arc<dyn Fetcher>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            selector: HostSelector::new(config.servers.clone(), prober, metrics.clone()),
            fetcher,
            metrics,
        }
    }

    /// Handle one inbound request. Never fails: selection and fetch failures become
    /// 404 and 500 responses.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let timer = Timer::new();
        let info = RequestInfo::from_request(&req);
        let span = info_span!("request", request_id = %Uuid::new_v4());

        let response = async {
            match self.route(&info).await {
                Ok(response) => response,
                Err(err) => {
                    let status = err.status();
                    if status.is_server_error() {
                        error!(
                            method = %info.method,
                            host = %info.host,
                            path = %info.path,
                            remote = %info.remote,
                            error = %err,
                            "returning {}",
                            status.as_u16()
                        );
                    } else {
                        info!(
                            method = %info.method,
                            host = %info.host,
                            path = %info.path,
                            remote = %info.remote,
                            "returning {}",
                            status.as_u16()
                        );
                    }
                    err.into()
                }
            }
        }
        .instrument(span)
        .await;

        if let Some(metrics) = &self.metrics {
            metrics.record_request(&info.method, response.status().as_u16(), timer.elapsed());
        }

        response
    }

    async fn route(&self, info: &RequestInfo) -> Result<Response<Body>, ProxyError> {
        let url = self
            .selector
            .select(&info.path)
            .await
            .ok_or(ProxyError::NotFound)?;

        // Named after the client's path, not the mirror's.
        let disposition = HeaderValue::from_str(&format!("attachment; filename={}", info.path))
            .map_err(|_| ProxyError::InvalidFilename(info.path.clone()))?;

        let timer = Timer::new();
        let fetched = self.fetcher.fetch(&url).await;
        if let Some(metrics) = &self.metrics {
            let success = fetched.as_ref().map_or(false, |f| f.status.is_success());
            metrics.record_fetch(success, timer.elapsed());
        }
        let fetched = fetched.map_err(|source| ProxyError::Fetch {
            url: url.clone(),
            source,
        })?;

        // The mirror passed the probe but refused the GET. Dropping `fetched`
        // here releases its connection.
        if !fetched.status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                url,
                status: fetched.status,
            });
        }

        // Clients always see 200 on success; the mirror's own 2xx is not forwarded.
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_DISPOSITION, disposition);
        if let Some(content_type) = fetched.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(content_length) = fetched.content_length {
            builder = builder.header(CONTENT_LENGTH, content_length);
        }

        // The upstream stream moves into the response body and is dropped with it,
        // whether the copy completes, fails, or the client goes away.
        let response = builder.body(Body::wrap_stream(fetched.body))?;

        info!(
            method = %info.method,
            host = %info.host,
            path = %info.path,
            remote = %info.remote,
            upstream = %url,
            "proxied"
        );

        Ok(response)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no configured server has the requested path")]
    NotFound,

    #[error("fetching {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("{url} answered {status} to GET")]
    UpstreamStatus { url: String, status: StatusCode },

    #[error("path {0:?} cannot be used as a filename")]
    InvalidFilename(String),

    #[error("failed to build response: {0}")]
    Response(#[from] hyper::http::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::Fetch { .. }
            | ProxyError::UpstreamStatus { .. }
            | ProxyError::InvalidFilename(_)
            | ProxyError::Response(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = err.status();
        response
    }
}
