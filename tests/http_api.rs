//! HTTP front door over a loopback socket.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::net::TcpListener;

use geocode_pipeline::config::ServerConfig;
use geocode_pipeline::{HttpServer, Pipeline, Shutdown};

mod common;
use common::{brazil, MockProvider, Reply};

async fn serve(pipeline: Pipeline) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&ServerConfig::default(), pipeline);
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });
    (addr, shutdown, handle)
}

#[tokio::test]
async fn search_routes_map_outcomes_to_statuses() {
    let osm = Arc::new(
        MockProvider::new("osm")
            .reply("brazil", Reply::Found(brazil("brazil")))
            .reply("broken", Reply::Fail),
    );
    let (addr, shutdown, handle) = serve(common::pipeline(&[osm.clone()])).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/search");

    let found = client.get(&url).query(&[("q", "  brazil ")]).send().await.unwrap();
    assert_eq!(found.status(), 200);
    let body: Value = found.json().await.unwrap();
    assert_eq!(body["country_code"], "BR");
    assert_eq!(body["type"], "country");

    let missing = client.get(&url).query(&[("q", "nonexistent-place-xyz")]).send().await.unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    let blank = client.get(&url).query(&[("q", "   ")]).send().await.unwrap();
    assert_eq!(blank.status(), 400);

    let failed = client.get(&url).query(&[("q", "broken")]).send().await.unwrap();
    assert_eq!(failed.status(), 502);
    let body: Value = failed.json().await.unwrap();
    assert_eq!(body["error"], "provider_error");

    // Cached repeat does not reach the provider again.
    client.get(&url).query(&[("q", "brazil")]).send().await.unwrap();
    assert_eq!(osm.calls(), 3);

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn stats_and_health_are_exposed() {
    let osm = Arc::new(MockProvider::new("osm"));
    let (addr, shutdown, handle) = serve(common::pipeline(&[osm])).await;
    let client = reqwest::Client::new();

    client
        .get(format!("http://{addr}/search"))
        .query(&[("q", "somewhere")])
        .send()
        .await
        .unwrap();

    let health = client.get(format!("http://{addr}/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "ok");

    let stats: Value = client
        .get(format!("http://{addr}/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["cache_entries"], 1);
    assert_eq!(stats["cache_pending"], 0);
    assert_eq!(stats["cache_write_failures"], 0);
    assert_eq!(stats["balancer"]["total_requests"], 1);
    assert_eq!(stats["balancer"]["providers"][0]["name"], "osm");

    shutdown.trigger();
    handle.await.unwrap();
}
