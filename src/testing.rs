//! Local HTTP server for tests that exercise real request and response
//! handling.

use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Serves `router` on an ephemeral loopback port and returns its base URL.
pub(crate) async fn spawn_server(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
