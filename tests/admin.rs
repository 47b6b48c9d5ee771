//! Admin surface: runtime membership changes and status.

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{client, proxy_config, start_mock_backend, start_proxy};

#[tokio::test]
async fn test_add_and_remove_adjust_routing() {
    let a = start_mock_backend("a").await;
    let b = start_mock_backend("b").await;

    let (proxy, shutdown) = start_proxy(proxy_config(&[a], "roundrobin")).await;
    let client = client();
    let base = format!("http://{}", proxy.local_addr);

    let res = client
        .post(format!("{}/add-server", base))
        .json(&json!({ "server_url": format!("http://{}", b) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let added: Value = res.json().await.unwrap();
    assert_eq!(added["identity"], b.to_string());
    assert_eq!(added["alive"], true);

    assert_eq!(proxy.pool.len(), 2);
    assert_eq!(proxy.pool.ring_len(), 2);

    let mut seen = Vec::new();
    for _ in 0..4 {
        let res = client.get(format!("{}/", base)).send().await.unwrap();
        seen.push(res.text().await.unwrap());
    }
    seen.sort();
    assert_eq!(seen, vec!["a", "a", "b", "b"]);

    let res = client
        .post(format!("{}/remove-server", base))
        .json(&json!({ "server_url": format!("http://{}", a) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(proxy.pool.len(), 1);
    assert_eq!(proxy.pool.ring_len(), 1);

    for _ in 0..3 {
        let res = client.get(format!("{}/", base)).send().await.unwrap();
        assert_eq!(res.text().await.unwrap(), "b");
    }

    let backends: Vec<Value> = client
        .get(format!("{}/admin/backends", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(backends.len(), 1);
    assert_eq!(backends[0]["address"], format!("http://{}", b));

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_admin_error_statuses() {
    let a = start_mock_backend("a").await;
    let (proxy, shutdown) = start_proxy(proxy_config(&[a], "roundrobin")).await;
    let client = client();
    let base = format!("http://{}", proxy.local_addr);

    // Same host identity, spelled differently.
    let res = client
        .post(format!("{}/add-server", base))
        .json(&json!({ "server_url": a.to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(format!("{}/remove-server", base))
        .json(&json!({ "server_url": "http://127.0.0.1:1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(format!("{}/add-server", base))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid Request to add a new server");

    let res = client
        .post(format!("{}/add-server", base))
        .json(&json!({ "server_url": "ftp://files.example:21" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(format!("{}/add-server", base))
        .json(&json!({ "server_url": "http://127.0.0.1:2", "weight": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "weight must be at least 1");

    assert_eq!(proxy.pool.len(), 1);

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_status_reports_pool() {
    let a = start_mock_backend("a").await;
    let b = start_mock_backend("b").await;
    let (proxy, shutdown) = start_proxy(proxy_config(&[a, b], "consistentHashing")).await;

    proxy.pool.backends()[1].set_alive(false);

    let status: Value = client()
        .get(format!("http://{}/admin/status", proxy.local_addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["strategy"], "consistentHashing");
    assert_eq!(status["backends"], 2);
    assert_eq!(status["alive"], 1);

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_admin_requires_bearer_key_when_configured() {
    let a = start_mock_backend("a").await;
    let mut config = proxy_config(&[a], "roundrobin");
    config.admin.api_key = "s3cret".into();
    let (proxy, shutdown) = start_proxy(config).await;
    let client = client();
    let base = format!("http://{}", proxy.local_addr);

    let res = client.get(format!("{}/admin/status", base)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/admin/status", base))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/admin/status", base))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Proxied traffic needs no key.
    let res = client.get(format!("{}/", base)).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "a");

    shutdown.trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn test_disabled_admin_paths_are_proxied() {
    let a = start_mock_backend("a").await;
    let mut config = proxy_config(&[a], "roundrobin");
    config.admin.enabled = false;
    let (proxy, shutdown) = start_proxy(config).await;

    let res = client()
        .post(format!("http://{}/add-server", proxy.local_addr))
        .json(&json!({ "server_url": "http://127.0.0.1:1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "a");
    assert_eq!(proxy.pool.len(), 1);

    shutdown.trigger();
    proxy.wait().await.unwrap();
}
