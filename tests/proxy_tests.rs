// tests/proxy_tests.rs
use failover_proxy::config::Config;
use failover_proxy::proxy::Proxy;
use failover_proxy::server::{accept_loop, RequestHandler};
use hyper::{Body, Request, StatusCode};
use std::sync::Arc;
use tokio::net::TcpListener;

fn config(servers: Vec<String>) -> Arc<Config> {
    Arc::new(Config {
        port: 8080,
        servers,
        use_includes: false,
        timeout: 2000,
        idle_timeout: 0,
        metrics_port: None,
    })
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("host", "proxy.local")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_second_mirror_serves_when_first_misses() {
    let mut a = mockito::Server::new_async().await;
    let mut b = mockito::Server::new_async().await;

    let a_head = a
        .mock("HEAD", "/file.txt")
        .with_status(404)
        .create_async()
        .await;
    let a_get = a.mock("GET", "/file.txt").expect(0).create_async().await;
    let b_head = b
        .mock("HEAD", "/file.txt")
        .with_status(200)
        .create_async()
        .await;
    let b_get = b
        .mock("GET", "/file.txt")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("hello")
        .create_async()
        .await;

    let proxy = Proxy::new(config(vec![a.url(), b.url()]), None).unwrap();
    let response = proxy.handle(get("/file.txt")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.headers()["content-length"], "5");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=/file.txt"
    );
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&body[..], b"hello");

    a_head.assert_async().await;
    a_get.assert_async().await;
    b_head.assert_async().await;
    b_get.assert_async().await;
}

#[tokio::test]
async fn test_first_mirror_wins_and_second_is_never_probed() {
    let mut a = mockito::Server::new_async().await;
    let mut b = mockito::Server::new_async().await;

    a.mock("HEAD", "/pkg.tar.gz").with_status(200).create_async().await;
    a.mock("GET", "/pkg.tar.gz")
        .with_status(200)
        .with_header("content-type", "application/gzip")
        .with_body("from-a")
        .create_async()
        .await;
    let b_any = b
        .mock("HEAD", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let proxy = Proxy::new(config(vec![a.url(), b.url()]), None).unwrap();
    let response = proxy.handle(get("/pkg.tar.gz")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&body[..], b"from-a");
    b_any.assert_async().await;
}

#[tokio::test]
async fn test_all_mirrors_missing_is_404() {
    let mut a = mockito::Server::new_async().await;
    a.mock("HEAD", "/gone").with_status(404).create_async().await;
    let a_get = a.mock("GET", "/gone").expect(0).create_async().await;

    let proxy = Proxy::new(config(vec![a.url(), "http://127.0.0.1:1".to_string()]), None).unwrap();
    let response = proxy.handle(get("/gone")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    a_get.assert_async().await;
}

#[tokio::test]
async fn test_mirror_refusing_get_after_probe_is_500() {
    let mut a = mockito::Server::new_async().await;
    a.mock("HEAD", "/f").with_status(200).create_async().await;
    a.mock("GET", "/f")
        .with_status(403)
        .with_header("content-type", "text/plain")
        .with_body("denied")
        .create_async()
        .await;

    let proxy = Proxy::new(config(vec![a.url()]), None).unwrap();
    let response = proxy.handle(get("/f")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get("content-disposition").is_none());
}

#[tokio::test]
async fn test_served_over_tcp_with_remote_address() {
    let mut mirror = mockito::Server::new_async().await;
    mirror.mock("HEAD", "/file.txt").with_status(200).create_async().await;
    mirror
        .mock("GET", "/file.txt")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("hello")
        .create_async()
        .await;

    let proxy = Arc::new(Proxy::new(config(vec![mirror.url()]), None).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(accept_loop(listener, RequestHandler::new(proxy), async {
        stop_rx.await.ok();
    }));

    let response = reqwest::get(format!("http://{}/file.txt", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=/file.txt"
    );
    assert_eq!(response.text().await.unwrap(), "hello");

    let missing = reqwest::get(format!("http://{}/other.txt", addr)).await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
