use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use warehouse_api::app::services::AppServices;
use warehouse_infra::InMemoryWarehouseStore;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppServices::in_memory()).await
    }

    async fn spawn_with(services: AppServices) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = warehouse_api::app::build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn seed(client: &reqwest::Client, srv: &TestServer) {
    let res = client
        .post(srv.url("/articles"))
        .json(&json!({
            "inventory": [
                {"art_id": "1", "name": "leg", "stock": "12"},
                {"art_id": "2", "name": "screw", "stock": "17"},
                {"art_id": "3", "name": "seat", "stock": "2"},
                {"art_id": "4", "name": "table top", "stock": "1"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(srv.url("/products"))
        .json(&json!({
            "products": [
                {
                    "productId": "chair",
                    "name": "Dining Chair",
                    "contain_articles": [
                        {"art_id": "1", "amount_of": "4"},
                        {"art_id": "2", "amount_of": "8"},
                        {"art_id": "3", "amount_of": "1"}
                    ]
                },
                {
                    "productId": "table",
                    "name": "Dinning Table",
                    "contain_articles": [
                        {"art_id": "1", "amount_of": 4},
                        {"art_id": "2", "amount_of": 8},
                        {"art_id": "4", "amount_of": 1}
                    ]
                }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

async fn products(client: &reqwest::Client, srv: &TestServer) -> Vec<Value> {
    let res = client.get(srv.url("/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["products"].as_array().unwrap().clone()
}

fn stock_of(products: &[Value], id: &str) -> i64 {
    products
        .iter()
        .find(|p| p["productId"] == id)
        .and_then(|p| p["stock"].as_i64())
        .unwrap()
}

async fn sell(client: &reqwest::Client, srv: &TestServer, id: &str) -> reqwest::Response {
    client
        .post(srv.url("/products/sell"))
        .json(&json!({"productId": id}))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_and_readiness() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/readiness")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_fails_once_store_is_closed() {
    let services = AppServices::in_memory();
    services.close().await;
    let srv = TestServer::spawn_with(services).await;

    let res = reqwest::get(srv.url("/readiness")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "E003");
}

#[tokio::test]
async fn listing_reports_available_units() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed(&client, &srv).await;

    let listed = products(&client, &srv).await;
    assert_eq!(listed.len(), 2);
    // leg 12/4 = 3, screw 17/8 = 2, seat 2/1 = 2.
    assert_eq!(stock_of(&listed, "chair"), 2);
    // table top 1/1 = 1.
    assert_eq!(stock_of(&listed, "table"), 1);

    let chair = listed.iter().find(|p| p["productId"] == "chair").unwrap();
    assert_eq!(chair["name"], "Dining Chair");
    assert_eq!(chair["contain_articles"][0], json!({"art_id": "1", "amount_of": 4}));
}

#[tokio::test]
async fn selling_decrements_shared_articles() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed(&client, &srv).await;

    let res = sell(&client, &srv, "table").await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // leg 8/4 = 2, screw 9/8 = 1, seat 2/1 = 2 → chair now 1.
    let listed = products(&client, &srv).await;
    assert_eq!(stock_of(&listed, "table"), 0);
    assert_eq!(stock_of(&listed, "chair"), 1);

    let res = client.get(srv.url("/articles")).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    let leg = body["inventory"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["art_id"] == "1")
        .unwrap();
    assert_eq!(leg["stock"], 8);
}

#[tokio::test]
async fn selling_out_of_stock_product_is_refused() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed(&client, &srv).await;

    assert_eq!(sell(&client, &srv, "table").await.status(), StatusCode::NO_CONTENT);

    let res = sell(&client, &srv, "table").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "E006");

    // A refused sale changes nothing.
    let listed = products(&client, &srv).await;
    assert_eq!(stock_of(&listed, "chair"), 1);
}

#[tokio::test]
async fn selling_unknown_product_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed(&client, &srv).await;

    let res = sell(&client, &srv, "sofa").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "E005");
}

#[tokio::test]
async fn product_with_unknown_article_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed(&client, &srv).await;

    let res = client
        .post(srv.url("/products"))
        .json(&json!({
            "products": [{
                "productId": "stool",
                "name": "Stool",
                "contain_articles": [{"art_id": "99", "amount_of": 1}]
            }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "E005");

    assert_eq!(products(&client, &srv).await.len(), 2);
}

#[tokio::test]
async fn malformed_json_is_e001() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/articles"))
        .header("content-type", "application/json")
        .body("{\"inventory\": [")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "E001");
}

#[tokio::test]
async fn invalid_values_are_e002() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let non_numeric = client
        .post(srv.url("/articles"))
        .json(&json!({"inventory": [{"art_id": "1", "name": "leg", "stock": "many"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(non_numeric.status(), StatusCode::BAD_REQUEST);
    let body: Value = non_numeric.json().await.unwrap();
    assert_eq!(body["errorCode"], "E002");

    let negative = client
        .post(srv.url("/articles"))
        .json(&json!({"inventory": [{"art_id": "1", "name": "leg", "stock": -3}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);
    let body: Value = negative.json().await.unwrap();
    assert_eq!(body["errorCode"], "E002");

    let zero_amount = client
        .post(srv.url("/products"))
        .json(&json!({
            "products": [{"productId": "x", "name": "X", "contain_articles": [{"art_id": "1", "amount_of": 0}]}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(zero_amount.status(), StatusCode::BAD_REQUEST);
    let body: Value = zero_amount.json().await.unwrap();
    assert_eq!(body["errorCode"], "E002");
}

#[tokio::test]
async fn overflowing_repeated_article_is_e002_and_leaves_stock_alone() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed(&client, &srv).await;

    let res = client
        .post(srv.url("/products"))
        .json(&json!({
            "products": [{
                "productId": "stool",
                "name": "Stool",
                "contain_articles": [
                    {"art_id": "1", "amount_of": i64::MAX},
                    {"art_id": "1", "amount_of": 3}
                ]
            }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "E002");

    assert_eq!(sell(&client, &srv, "stool").await.status(), StatusCode::NOT_FOUND);
    let listed = products(&client, &srv).await;
    assert_eq!(listed.len(), 2);
    assert_eq!(stock_of(&listed, "chair"), 2);
}

#[tokio::test]
async fn product_without_id_gets_generated_id() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed(&client, &srv).await;

    let res = client
        .post(srv.url("/products"))
        .json(&json!({
            "products": [{"name": "Bench", "contain_articles": [{"art_id": "1", "amount_of": 2}]}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let listed = products(&client, &srv).await;
    let bench = listed.iter().find(|p| p["name"] == "Bench").unwrap();
    assert!(!bench["productId"].as_str().unwrap().is_empty());
    assert_eq!(bench["stock"], 6);
}

#[tokio::test]
async fn concurrent_sells_over_http_never_oversell() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed(&client, &srv).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let client = client.clone();
        let url = srv.url("/products/sell");
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({"productId": "chair"}))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }

    let mut sold = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::NO_CONTENT => sold += 1,
            StatusCode::BAD_REQUEST => {}
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(sold, 2);
    assert_eq!(stock_of(&products(&client, &srv).await, "chair"), 0);
}

#[tokio::test]
async fn slow_store_hits_request_deadline() {
    let store = Arc::new(InMemoryWarehouseStore::new());
    let services = AppServices::new(store.clone(), Duration::from_millis(50));
    let srv = TestServer::spawn_with(services).await;
    let client = reqwest::Client::new();

    // Hold the store's sale lock so the next sale cannot start.
    use warehouse_infra::SaleStore;
    let blocker = store.begin_sale().await.unwrap();

    let res = sell(&client, &srv, "chair").await;
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "E003");

    drop(blocker);
}
