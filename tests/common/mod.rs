use reqwest::{header, Client, StatusCode};
use sea_orm::{ConnectOptions, Database};
use serde_json::json;
use std::sync::Arc;

use rust_lavka::api_router;
use rust_lavka::email::EmailClient;
use rust_lavka::entities::{primary_setup, setup_schema};

//Each test gets its own in-memory database and its own server on an
//ephemeral port. A single pooled connection keeps sqlite::memory: from
//handing every pool member a different empty database.
pub async fn spawn_app() -> String {
    std::env::set_var("SECRET", "integration-test-secret");

    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options.max_connections(1);
    let db = Database::connect(options)
        .await
        .expect("Failed to connect to the test database");
    setup_schema(&db).await;

    let shared_db = Arc::new(db);
    primary_setup(shared_db.clone()).await;

    let email = Arc::new(EmailClient::from_env());
    let app = api_router(shared_db, email);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server crashed");
    });

    format!("http://{}", addr)
}

pub fn bearer(token: &str) -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token))
            .expect("Failed to create Authorization header"),
    );
    headers
}

pub async fn login(base: &str, client: &Client, username: &str, password: &str) -> String {
    let payload = json!({
        "username": username,
        "password": password
    });

    let response = client
        .post(format!("{base}/login"))
        .json(&payload)
        .send()
        .await
        .expect("Failed to send login request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login response JSON");
    body["token"]
        .as_str()
        .expect("Token not found in login response")
        .to_owned()
}

pub async fn admin_token(base: &str, client: &Client) -> String {
    //Seeded by primary_setup on every fresh database.
    login(base, client, "admin", "Secret15").await
}

pub async fn register_and_login(base: &str, client: &Client, username: &str) -> String {
    let payload = json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "Muzion15"
    });

    let response = client
        .post(format!("{base}/register"))
        .json(&payload)
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), StatusCode::CREATED);

    login(base, client, username, "Muzion15").await
}

//Creates a category and a product in it, returning the product id.
pub async fn create_product(base: &str, client: &Client, token: &str, name: &str, price: f64) -> i32 {
    let category_payload = json!({
        "name": format!("category-for-{name}")
    });
    let response = client
        .post(format!("{base}/api/admin/category"))
        .headers(bearer(token))
        .json(&category_payload)
        .send()
        .await
        .expect("Failed to create category");
    assert_eq!(response.status(), StatusCode::CREATED);

    let categories = client
        .get(format!("{base}/api/admin/category"))
        .headers(bearer(token))
        .send()
        .await
        .expect("Failed to list categories")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse categories JSON");
    let category_id = categories
        .as_array()
        .expect("Categories should be an array")
        .iter()
        .find(|entry| entry["name"] == category_payload["name"])
        .expect("Created category not found")["id"]
        .as_i64()
        .expect("Category id should be a number");

    let product_payload = json!({
        "name": name,
        "price": price,
        "category_id": category_id,
        "stock": 100
    });
    let response = client
        .post(format!("{base}/api/admin/product"))
        .headers(bearer(token))
        .json(&product_payload)
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(response.status(), StatusCode::CREATED);

    let products = client
        .get(format!("{base}/api/admin/product"))
        .headers(bearer(token))
        .send()
        .await
        .expect("Failed to list products")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse products JSON");
    products
        .as_array()
        .expect("Products should be an array")
        .iter()
        .find(|entry| entry["name"] == name)
        .expect("Created product not found")["id"]
        .as_i64()
        .expect("Product id should be a number") as i32
}
