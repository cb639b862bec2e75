use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio;

mod common;
use common::{admin_token, bearer, create_product, register_and_login, spawn_app};

#[tokio::test]
async fn placing_an_order_empties_the_cart() {
    let base = spawn_app().await;
    let client = Client::new();

    let admin = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &admin, "bagel", 3.0).await;
    let token = register_and_login(&base, &client, "Buyer").await;

    let response = client
        .post(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .json(&json!({
            "product_id": product_id,
            "quantity": 2
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{base}/api/order"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send order request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse order response JSON");
    assert!(body["order_id"].is_number());

    let body = client
        .get(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");
    assert_eq!(body["items"].as_array().expect("array").len(), 0);
    assert_eq!(body["total_cost"], 0.0);
}

#[tokio::test]
async fn ordering_with_an_empty_cart_is_rejected() {
    let base = spawn_app().await;
    let client = Client::new();

    let token = register_and_login(&base, &client, "Buyer").await;

    let response = client
        .post(format!("{base}/api/order"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send order request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_keeps_the_price_it_was_placed_at() {
    let base = spawn_app().await;
    let client = Client::new();

    let admin = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &admin, "bagel", 3.0).await;
    let token = register_and_login(&base, &client, "Buyer").await;

    client
        .post(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .json(&json!({
            "product_id": product_id,
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send add request");

    let response = client
        .post(format!("{base}/api/order"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send order request");
    assert_eq!(response.status(), StatusCode::CREATED);

    //Reprice the product after the order was placed.
    let response = client
        .patch(format!("{base}/api/admin/product/{product_id}"))
        .headers(bearer(&admin))
        .json(&json!({
            "price": 99.0
        }))
        .send()
        .await
        .expect("Failed to send patch request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = client
        .get(format!("{base}/api/order"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send get orders request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse orders JSON");

    let orders = body.as_array().expect("Orders should be an array");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["total_cost"], 3.0);
    assert_eq!(orders[0]["items"][0]["price"], 3.0);
    assert_eq!(orders[0]["status"], "created");
}

#[tokio::test]
async fn users_only_see_their_own_orders() {
    let base = spawn_app().await;
    let client = Client::new();

    let admin = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &admin, "bagel", 3.0).await;

    for username in ["FirstBuyer", "SecondBuyer"] {
        let token = register_and_login(&base, &client, username).await;
        client
            .post(format!("{base}/api/cart"))
            .headers(bearer(&token))
            .json(&json!({
                "product_id": product_id,
                "quantity": 1
            }))
            .send()
            .await
            .expect("Failed to send add request");
        let response = client
            .post(format!("{base}/api/order"))
            .headers(bearer(&token))
            .send()
            .await
            .expect("Failed to send order request");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let token = common::login(&base, &client, "FirstBuyer", "Muzion15").await;
    let body = client
        .get(format!("{base}/api/order"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send get orders request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse orders JSON");
    assert_eq!(body.as_array().expect("array").len(), 1);

    //The admin view spans everyone.
    let body = client
        .get(format!("{base}/api/admin/order"))
        .headers(bearer(&admin))
        .send()
        .await
        .expect("Failed to send get orders request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse orders JSON");
    assert_eq!(body.as_array().expect("array").len(), 2);
}

#[tokio::test]
async fn admin_can_move_an_order_through_statuses() {
    let base = spawn_app().await;
    let client = Client::new();

    let admin = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &admin, "bagel", 3.0).await;
    let token = register_and_login(&base, &client, "Buyer").await;

    client
        .post(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .json(&json!({
            "product_id": product_id,
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send add request");
    let body = client
        .post(format!("{base}/api/order"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send order request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse order response JSON");
    let order_id = body["order_id"].as_i64().expect("Order id missing");

    let response = client
        .patch(format!("{base}/api/admin/order/{order_id}"))
        .headers(bearer(&admin))
        .json(&json!({
            "status": "processing"
        }))
        .send()
        .await
        .expect("Failed to send patch request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .patch(format!("{base}/api/admin/order/{order_id}"))
        .headers(bearer(&admin))
        .json(&json!({
            "status": "teleporting"
        }))
        .send()
        .await
        .expect("Failed to send patch request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = client
        .get(format!("{base}/api/order"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send get orders request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse orders JSON");
    assert_eq!(body[0]["status"], "processing");
}
