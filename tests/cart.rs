use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio;

mod common;
use common::{admin_token, bearer, create_product, register_and_login, spawn_app};

fn guest_client() -> Client {
    //The guest cart rides on the session cookie.
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

#[tokio::test]
async fn guest_can_add_and_view_cart() {
    let base = spawn_app().await;
    let client = guest_client();

    let token = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &token, "bagel", 3.5).await;

    let response = client
        .post(format!("{base}/api/cart"))
        .json(&json!({
            "product_id": product_id,
            "quantity": 2
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = client
        .get(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");

    let items = body["items"].as_array().expect("Items should be an array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], product_id);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["name"], "bagel");
    assert_eq!(body["total_cost"], 7.0);
    assert_eq!(body["item_count"], 2);
}

#[tokio::test]
async fn guest_cart_is_scoped_to_the_session() {
    let base = spawn_app().await;
    let first = guest_client();
    let second = guest_client();

    let token = admin_token(&base, &first).await;
    let product_id = create_product(&base, &first, &token, "bagel", 3.5).await;

    let response = first
        .post(format!("{base}/api/cart"))
        .json(&json!({
            "product_id": product_id,
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = second
        .get(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");
    assert_eq!(body["items"].as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn guest_same_variant_coalesces_into_one_entry() {
    let base = spawn_app().await;
    let client = guest_client();

    let token = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &token, "shirt", 10.0).await;

    for _ in 0..2 {
        let response = client
            .post(format!("{base}/api/cart"))
            .json(&json!({
                "product_id": product_id,
                "quantity": 1,
                "size": "M",
                "color": "red"
            }))
            .send()
            .await
            .expect("Failed to send add request");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    //A different size stays its own line item.
    let response = client
        .post(format!("{base}/api/cart"))
        .json(&json!({
            "product_id": product_id,
            "quantity": 1,
            "size": "L",
            "color": "red"
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = client
        .get(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");

    let items = body["items"].as_array().expect("Items should be an array");
    assert_eq!(items.len(), 2);
    let medium = items
        .iter()
        .find(|entry| entry["size"] == "M")
        .expect("Medium entry missing");
    assert_eq!(medium["quantity"], 2);
}

#[tokio::test]
async fn guest_can_patch_and_remove_entries() {
    let base = spawn_app().await;
    let client = guest_client();

    let token = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &token, "bagel", 2.0).await;

    let response = client
        .post(format!("{base}/api/cart"))
        .json(&json!({
            "product_id": product_id,
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = client
        .get(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");
    let entry_id = body["items"][0]["id"].as_i64().expect("Entry id missing");

    let response = client
        .patch(format!("{base}/api/cart/{entry_id}"))
        .json(&json!({
            "quantity": 5
        }))
        .send()
        .await
        .expect("Failed to send patch request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = client
        .get(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");
    assert_eq!(body["items"][0]["quantity"], 5);
    assert_eq!(body["total_cost"], 10.0);

    let response = client
        .delete(format!("{base}/api/cart/{entry_id}"))
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = client
        .get(format!("{base}/api/cart"))
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
async fn patching_quantity_to_zero_removes_the_entry() {
    let base = spawn_app().await;
    let client = guest_client();

    let token = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &token, "bagel", 2.0).await;

    client
        .post(format!("{base}/api/cart"))
        .json(&json!({
            "product_id": product_id,
            "quantity": 3
        }))
        .send()
        .await
        .expect("Failed to send add request");

    let body = client
        .get(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");
    let entry_id = body["items"][0]["id"].as_i64().expect("Entry id missing");

    let response = client
        .patch(format!("{base}/api/cart/{entry_id}"))
        .json(&json!({
            "quantity": 0
        }))
        .send()
        .await
        .expect("Failed to send patch request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = client
        .get(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");
    assert_eq!(body["items"].as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn zero_quantity_add_is_rejected() {
    let base = spawn_app().await;
    let client = guest_client();

    let token = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &token, "bagel", 2.0).await;

    let response = client
        .post(format!("{base}/api/cart"))
        .json(&json!({
            "product_id": product_id,
            "quantity": 0
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn adding_unknown_product_is_rejected() {
    let base = spawn_app().await;
    let client = guest_client();

    let response = client
        .post(format!("{base}/api/cart"))
        .json(&json!({
            "product_id": 424242,
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn authenticated_cart_flow() {
    let base = spawn_app().await;
    let client = Client::new();

    let admin = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &admin, "bagel", 4.0).await;
    let token = register_and_login(&base, &client, "CartUser").await;

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

    //Same variant coalesces in the database cart too.
    let response = client
        .post(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .json(&json!({
            "product_id": product_id,
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = client
        .get(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");

    let items = body["items"].as_array().expect("Items should be an array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(body["total_cost"], 12.0);

    let entry_id = items[0]["id"].as_i64().expect("Entry id missing");
    let response = client
        .delete(format!("{base}/api/cart/{entry_id}"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::OK);

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
async fn clearing_the_cart_works_for_both_modes() {
    let base = spawn_app().await;
    let client = guest_client();

    let admin = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &admin, "bagel", 4.0).await;

    client
        .post(format!("{base}/api/cart"))
        .json(&json!({
            "product_id": product_id,
            "quantity": 2
        }))
        .send()
        .await
        .expect("Failed to send add request");

    let response = client
        .delete(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send clear request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = client
        .get(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");
    assert_eq!(body["items"].as_array().expect("array").len(), 0);

    //Clearing an authenticated cart that was never touched still succeeds.
    let token = register_and_login(&base, &client, "ClearUser").await;
    let response = client
        .delete(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send clear request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn mutating_entries_before_the_cart_exists_is_rejected() {
    let base = spawn_app().await;
    let client = Client::new();

    //Fresh account, nothing ever added: no cart row exists yet.
    let token = register_and_login(&base, &client, "FreshUser").await;

    let response = client
        .patch(format!("{base}/api/cart/1"))
        .headers(bearer(&token))
        .json(&json!({
            "quantity": 2
        }))
        .send()
        .await
        .expect("Failed to send patch request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse response JSON");
    assert_eq!(body["error"], "Cart not found");

    let response = client
        .delete(format!("{base}/api/cart/1"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse response JSON");
    assert_eq!(body["error"], "Cart not found");
}

#[tokio::test]
async fn huge_quantities_saturate_instead_of_overflowing() {
    let base = spawn_app().await;
    let client = Client::new();

    let admin = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &admin, "bagel", 1.0).await;
    let token = register_and_login(&base, &client, "Hoarder").await;

    for quantity in [u32::MAX, 1] {
        let response = client
            .post(format!("{base}/api/cart"))
            .headers(bearer(&token))
            .json(&json!({
                "product_id": product_id,
                "quantity": quantity
            }))
            .send()
            .await
            .expect("Failed to send add request");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let body = client
        .get(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");
    let items = body["items"].as_array().expect("Items should be an array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], u32::MAX);
}

#[tokio::test]
async fn guest_cart_merges_into_account_on_login() {
    let base = spawn_app().await;
    let client = guest_client();

    let admin = admin_token(&base, &client).await;
    let bagel = create_product(&base, &client, &admin, "bagel", 3.0).await;
    let shirt = create_product(&base, &client, &admin, "shirt", 10.0).await;

    //Browse anonymously first.
    for (product_id, quantity) in [(bagel, 2), (shirt, 1)] {
        let response = client
            .post(format!("{base}/api/cart"))
            .json(&json!({
                "product_id": product_id,
                "quantity": quantity
            }))
            .send()
            .await
            .expect("Failed to send add request");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    //Logging in with the session cookie present moves the items over.
    let token = register_and_login(&base, &client, "MergeUser").await;

    let body = client
        .get(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");

    let items = body["items"].as_array().expect("Items should be an array");
    assert_eq!(items.len(), 2);
    assert_eq!(body["total_cost"], 16.0);
    assert_eq!(body["item_count"], 3);

    //The session cart is empty after a successful merge.
    let body = client
        .get(format!("{base}/api/cart"))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");
    assert_eq!(body["items"].as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn merge_coalesces_with_items_already_in_the_account() {
    let base = spawn_app().await;
    let client = guest_client();

    let admin = admin_token(&base, &client).await;
    let product_id = create_product(&base, &client, &admin, "bagel", 3.0).await;
    let token = register_and_login(&base, &client, "ReturningUser").await;

    //Seed the account cart, then go back to browsing anonymously.
    let response = client
        .post(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .json(&json!({
            "product_id": product_id,
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{base}/api/cart"))
        .json(&json!({
            "product_id": product_id,
            "quantity": 2
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    //Second login merges the guest quantity into the existing entry.
    let token = common::login(&base, &client, "ReturningUser", "Muzion15").await;

    let body = client
        .get(format!("{base}/api/cart"))
        .headers(bearer(&token))
        .send()
        .await
        .expect("Failed to send get cart request")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse cart JSON");

    let items = body["items"].as_array().expect("Items should be an array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(body["total_cost"], 9.0);
}
