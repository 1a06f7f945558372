// src/main.rs
use anyhow::{Context, Result};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use failover_proxy::{
    config::{self, DEFAULT_CONFIG_PATH},
    metrics::MetricsRegistry,
    proxy::Proxy,
    server::{RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("failover_proxy=info".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Single optional positional argument: the config path.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!("Loading configuration from: {}", config_path);
    let config = Arc::new(
        config::load_config(&config_path)
            .with_context(|| format!("invalid configuration in {}", config_path))?,
    );

    let metrics = match config.metrics_port {
        Some(port) => {
            let registry = MetricsRegistry::new()?;
            let collector = registry.collector();
            start_metrics_server(([0, 0, 0, 0], port).into(), registry).await?;
            Some(collector)
        }
        None => None,
    };

    let proxy = Arc::new(
        Proxy::new(config.clone(), metrics).context("failed to build upstream HTTP clients")?,
    );
    let handler = RequestHandler::new(proxy);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        servers = ?config.servers,
        timeout_ms = config.timeout,
        "Starting server on {}",
        addr
    );

    ServerBuilder::new(addr)
        .with_handler(handler)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn start_metrics_server(addr: SocketAddr, registry: MetricsRegistry) -> Result<()> {
    let registry = Arc::new(registry);

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();

                async move {
                    let mut response = Response::new(Body::empty());
                    if req.uri().path() != "/metrics" {
                        *response.status_mut() = StatusCode::NOT_FOUND;
                        return Ok::<_, Infallible>(response);
                    }

                    match registry.gather() {
                        Ok(metrics) => {
                            response.headers_mut().insert(
                                hyper::header::CONTENT_TYPE,
                                hyper::header::HeaderValue::from_static(
                                    "text/plain; version=0.0.4",
                                ),
                            );
                            *response.body_mut() = Body::from(metrics);
                        }
                        Err(e) => {
                            error!("Failed to encode metrics: {}", e);
                            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                        }
                    }
                    Ok(response)
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("failed to bind metrics listener on {}", addr))?
        .serve(make_service);

    info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
