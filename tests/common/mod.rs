//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use books_api::config::AppConfig;
use books_api::http::HttpServer;
use books_api::lifecycle::Shutdown;
use books_api::store::MemoryBookStore;

/// A running server backed by an in-memory store.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: MemoryBookStore,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get_books(&self) -> reqwest::Response {
        self.client.get(self.url("/books")).send().await.expect("server unreachable")
    }

    pub async fn post_json(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/books"))
            .json(&body)
            .send()
            .await
            .expect("server unreachable")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Defaults with limits high enough not to interfere.
#[allow(dead_code)]
pub fn relaxed_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.rate_limit.global.max = 1_000;
    config.rate_limit.write.max = 1_000;
    config
}

/// Start a server on an ephemeral loopback port.
pub async fn start_server(config: AppConfig) -> TestServer {
    let store = MemoryBookStore::new();
    let server = HttpServer::new(config, Arc::new(store.clone())).expect("valid config");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    TestServer {
        addr,
        store,
        client,
        shutdown,
    }
}
