//! Wiremock helpers for the releases API and asset downloads

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::constants::*;

/// Serve `release` from the latest-release endpoint
pub async fn mock_latest_release(server: &MockServer, release: Value) {
    Mock::given(method("GET"))
        .and(path(latest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(release))
        .mount(server)
        .await;
}

/// Serve `releases` from the all-releases endpoint
pub async fn mock_release_list(server: &MockServer, releases: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(releases_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(releases)))
        .mount(server)
        .await;
}

/// Respond to both release endpoints with a bare status code
pub async fn mock_releases_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(latest_path()))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(releases_path()))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Serve a non-JSON body from the latest-release endpoint
pub async fn mock_latest_garbage(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(latest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(server)
        .await;
}

/// Serve asset bytes at `ASSET_PATH`
pub async fn mock_asset_download(server: &MockServer, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(ASSET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

/// Fail every asset request with `status`
pub async fn mock_failing_asset(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(ASSET_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Deterministic payload of `len` bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Serve one asset response that announces `announced` bytes but closes
/// the connection after sending `sent`, returning the asset URL
pub async fn serve_truncated_asset(announced: usize, sent: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
            announced
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&payload(sent)).await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{}{}", addr, ASSET_PATH)
}
