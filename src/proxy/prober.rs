// src/proxy/prober.rs
use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode};
use std::fmt;
use std::time::Duration;

/// What a single existence check against one mirror found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The mirror answered 200 or 302.
    Available(StatusCode),
    /// The mirror answered with any other status.
    Missing(StatusCode),
    /// The HEAD request never produced a status (refused, DNS, timeout, bad URL).
    Unreachable(String),
}

impl ProbeOutcome {
    pub fn from_status(status: StatusCode) -> Self {
        if qualifies(status) {
            ProbeOutcome::Available(status)
        } else {
            ProbeOutcome::Missing(status)
        }
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Available(_) => "available",
            ProbeOutcome::Missing(_) => "missing",
            ProbeOutcome::Unreachable(_) => "unreachable",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Available(status) | ProbeOutcome::Missing(status) => {
                write!(f, "HTTP {}", status.as_u16())
            }
            ProbeOutcome::Unreachable(reason) => write!(f, "unreachable: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub resolved_url: String,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn ok(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Available(_))
    }
}

/// Only these two statuses count as "this mirror has the file".
pub fn qualifies(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::FOUND
}

/// Existence check for `host + path`. Implementations never fail; problems are
/// reported through [`ProbeOutcome`].
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, host: &str, path: &str) -> ProbeResult;
}

/// Issues a HEAD request per probe.
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        // Redirects are not followed so a mirror's own 302 is what gets classified.
        let mut builder = Client::builder().redirect(redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, host: &str, path: &str) -> ProbeResult {
        // Plain concatenation; no escaping or slash normalisation.
        let resolved_url = format!("{}{}", host, path);

        let outcome = match self.client.head(&resolved_url).send().await {
            Ok(response) => ProbeOutcome::from_status(response.status()),
            Err(e) => ProbeOutcome::Unreachable(e.to_string()),
        };

        ProbeResult {
            resolved_url,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_200_and_302_qualify() {
        assert!(qualifies(StatusCode::OK));
        assert!(qualifies(StatusCode::FOUND));
        assert!(!qualifies(StatusCode::NO_CONTENT));
        assert!(!qualifies(StatusCode::MOVED_PERMANENTLY));
        assert!(!qualifies(StatusCode::TEMPORARY_REDIRECT));
        assert!(!qualifies(StatusCode::NOT_FOUND));
        assert!(!qualifies(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_probe_available() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/file.txt")
            .with_status(200)
            .create_async()
            .await;

        let prober = HttpProber::new(Some(Duration::from_secs(2))).unwrap();
        let result = prober.probe(&server.url(), "/file.txt").await;

        mock.assert_async().await;
        assert!(result.ok());
        assert_eq!(result.resolved_url, format!("{}/file.txt", server.url()));
        assert_eq!(result.outcome, ProbeOutcome::Available(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_probe_redirect_is_not_followed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/moved.iso")
            .with_status(302)
            .with_header("location", "/elsewhere.iso")
            .create_async()
            .await;
        let elsewhere = server
            .mock("HEAD", "/elsewhere.iso")
            .with_status(404)
            .expect(0)
            .create_async()
            .await;

        let prober = HttpProber::new(None).unwrap();
        let result = prober.probe(&server.url(), "/moved.iso").await;

        elsewhere.assert_async().await;
        assert_eq!(result.outcome, ProbeOutcome::Available(StatusCode::FOUND));
    }

    #[tokio::test]
    async fn test_probe_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/file.txt")
            .with_status(404)
            .create_async()
            .await;

        let prober = HttpProber::new(None).unwrap();
        let result = prober.probe(&server.url(), "/file.txt").await;

        assert!(!result.ok());
        assert_eq!(result.outcome, ProbeOutcome::Missing(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_probe_unreachable_is_not_an_error() {
        let prober = HttpProber::new(Some(Duration::from_millis(500))).unwrap();
        let result = prober.probe("http://127.0.0.1:1", "/file.txt").await;

        assert!(!result.ok());
        assert_eq!(result.resolved_url, "http://127.0.0.1:1/file.txt");
        assert!(matches!(result.outcome, ProbeOutcome::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_silent_mirror_hits_probe_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let holder = tokio::spawn(async move {
            // Accept and never answer.
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let prober = HttpProber::new(Some(Duration::from_millis(200))).unwrap();
        let started = std::time::Instant::now();
        let result = prober.probe(&format!("http://{}", addr), "/file.txt").await;

        assert!(matches!(result.outcome, ProbeOutcome::Unreachable(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
        holder.abort();
    }

    #[tokio::test]
    async fn test_malformed_url_is_unreachable() {
        let prober = HttpProber::new(None).unwrap();
        let result = prober.probe("not a host", "/file.txt").await;

        assert!(matches!(result.outcome, ProbeOutcome::Unreachable(_)));
    }
}
