//! End-to-end routing through the proxy.

use axum::http::StatusCode;

use ring_proxy::config::HashKey;

mod common;

use common::{client, proxy_config, start_mock_backend, start_programmable_backend, start_proxy, MockResponse};

#[tokio::test]
async fn test_round_robin_cycles_backends_in_order() {
    let a = start_mock_backend("a").await;
    let b = start_mock_backend("b").await;
    let c = start_mock_backend("c").await;

    let (proxy, shutdown) = start_proxy(proxy_config(&[a, b, c], "roundrobin")).await;
    let client = client();

    let mut seen = Vec::new();
    for _ in 0..6 {
        let res = client
            .get(format!("http://{}/", proxy.local_addr))
            .send()
            .await
            .expect("Proxy unreachable");
        assert_eq!(res.status(), StatusCode::OK);
        seen.push(res.text().await.unwrap());
    }
    assert_eq!(seen, vec!["a", "b", "c", "a", "b", "c"]);

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_consistent_hashing_pins_client_to_backend() {
    let a = start_mock_backend("a").await;
    let b = start_mock_backend("b").await;
    let c = start_mock_backend("c").await;

    // Each request opens a new connection, so key on the client IP alone.
    let mut config = proxy_config(&[a, b, c], "consistentHashing");
    config.hash_key = HashKey::ClientIp;
    let (proxy, shutdown) = start_proxy(config).await;
    let client = client();

    let mut bodies = Vec::new();
    for path in ["/", "/x", "/y?z=1", "/"] {
        let res = client
            .get(format!("http://{}{}", proxy.local_addr, path))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        bodies.push(res.text().await.unwrap());
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]), "{:?}", bodies);

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_weighted_round_robin_honours_weights() {
    let a = start_mock_backend("a").await;
    let b = start_mock_backend("b").await;

    let mut config = proxy_config(&[a, b], "weightedRoundRobin");
    config.weights = vec![1, 2];
    let (proxy, shutdown) = start_proxy(config).await;
    let client = client();

    let mut seen = Vec::new();
    for _ in 0..6 {
        let res = client
            .get(format!("http://{}/", proxy.local_addr))
            .send()
            .await
            .unwrap();
        seen.push(res.text().await.unwrap());
    }
    assert_eq!(seen, vec!["a", "b", "b", "a", "b", "b"]);

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_unknown_strategy_is_rejected() {
    let a = start_mock_backend("a").await;
    let (proxy, shutdown) = start_proxy(proxy_config(&[a], "random")).await;

    let res = client()
        .get(format!("http://{}/", proxy.local_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text().await.unwrap(), "Invalid Load Balancing Algorithm");

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_dead_backend_is_not_proxied() {
    let a = start_mock_backend("a").await;
    let (proxy, shutdown) = start_proxy(proxy_config(&[a], "roundrobin")).await;

    proxy.pool.backends()[0].set_alive(false);

    let res = client()
        .get(format!("http://{}/", proxy.local_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "Service not available");

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_empty_pool_is_unavailable() {
    let (proxy, shutdown) = start_proxy(proxy_config(&[], "consistentHashing")).await;

    let res = client()
        .get(format!("http://{}/", proxy.local_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_connect_failure_maps_to_503() {
    let nowhere = common::unused_addr();
    let (proxy, shutdown) = start_proxy(proxy_config(&[nowhere], "roundrobin")).await;

    let res = client()
        .get(format!("http://{}/", proxy.local_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "Failed to connect to backend server");

    // A failed proxy attempt does not change liveness.
    assert!(proxy.pool.backends()[0].is_alive());

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_relays_status_headers_and_request_target() {
    let backend = start_programmable_backend(|request| async move {
        let body = format!(
            "{} {} {}",
            request.method,
            request.target,
            request.header("x-request-id").unwrap_or("missing")
        );
        MockResponse::status(404, body).with_header("x-backend", "mock")
    })
    .await;

    let (proxy, shutdown) = start_proxy(proxy_config(&[backend], "roundrobin")).await;
    let client = client();

    let res = client
        .get(format!("http://{}/some/path?x=1", proxy.local_addr))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.headers()["x-backend"], "mock");
    assert_eq!(res.headers()["x-request-id"], "req-42");
    assert_eq!(res.text().await.unwrap(), "GET /some/path?x=1 req-42");

    // Without a client-supplied ID one is generated and echoed.
    let res = client
        .get(format!("http://{}/", proxy.local_addr))
        .send()
        .await
        .unwrap();
    let generated = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());
    assert!(res.text().await.unwrap().ends_with(&generated));

    shutdown.trigger();
    proxy.wait().await.unwrap();
}
