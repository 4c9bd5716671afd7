//! In-process HTTP servers for fetch and client tests.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral localhost port for the rest of the test.
///
/// # Example
///
/// ```ignore
/// let addr = spawn_server(Router::new().route("/flux.tif", get(handler))).await;
/// let url = format!("http://{}/flux.tif", addr);
/// ```
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("test listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

/// A localhost URL on which nothing is listening.
pub async fn refused_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);
    format!("http://{}{}", addr, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_url_keeps_path() {
        let url = tokio_test::block_on(refused_url("/flux.tif"));
        assert!(url.starts_with("http://127.0.0.1:"));
        assert!(url.ends_with("/flux.tif"));
    }
}
