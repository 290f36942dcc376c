//! Local HTTP stand-ins for the aggregator and download hosts

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Requests captured by [`spawn_capture_server`], as (path, JSON body)
pub type Captured = Arc<Mutex<Vec<(String, Value)>>>;

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn capture(State(log): State<Captured>, uri: Uri, Json(body): Json<Value>) -> StatusCode {
    log.lock().unwrap().push((uri.path().to_string(), body));
    StatusCode::OK
}

/// Accepts any JSON POST and records it
pub async fn spawn_capture_server() -> (String, Captured) {
    let log: Captured = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/{*path}", post(capture))
        .with_state(log.clone());
    let addr = serve(router).await;
    (format!("http://{}", addr), log)
}

/// Serves `body` at `/web` and `/2go`; everything else is a 404
pub async fn spawn_download_server(body: &'static [u8]) -> String {
    let router = Router::new()
        .route("/web", get(move || async move { body }))
        .route("/2go", get(move || async move { body }));
    let addr = serve(router).await;
    format!("http://{}", addr)
}
