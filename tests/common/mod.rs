//! In-process API server over the in-memory stores.

#![allow(dead_code)]

use sitelog::storage::{InMemoryRecordStore, MemoryBlobStore};
use sitelog::transport;
use sitelog::Config;
use std::sync::Arc;

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: Arc<InMemoryRecordStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn spawn_server(store: InMemoryRecordStore) -> TestServer {
    let store = Arc::new(store);
    let blobs = Arc::new(MemoryBlobStore::new());
    let app_state = transport::http::AppState::new(store.clone(), blobs.clone(), &Config::in_memory());
    let router = transport::http::create_router(app_state);

    // Bind to an ephemeral port so tests can run in parallel.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        store,
        blobs,
    }
}
