use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::email::{EmailClient, OrderLine};
use crate::entities::{
    cart, cart_item, order, order_item, product,
    user::{self, Role},
};
use crate::middleware::{
    auth::{auth_middleware, AuthState, Claims},
    logging::{to_response, ApiError},
};

//ROUTERS
pub fn order_routes(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/order", get(get_my_orders).post(place_order))
        .layer(axum::middleware::from_fn_with_state(
            AuthState {
                db,
                role: Role::User,
            },
            auth_middleware,
        ))
}

pub fn admin_order_routes(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/order", get(admin_get_orders))
        .route("/order/{id}", patch(patch_order_status))
        .layer(axum::middleware::from_fn_with_state(
            AuthState {
                db,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}

//Routes
async fn place_order(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(email): Extension<Arc<EmailClient>>,
    Extension(claims): Extension<Claims>,
) -> Response {
    let user_id = claims.user_id;
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::TransactionCreationFailed),
            );
        }
    };

    let cart = match cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(&txn)
        .await
    {
        Ok(Some(cart)) => cart,
        Ok(None) => {
            let tmp = "Cart is empty".to_owned();
            return to_response(
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": tmp
                    })),
                ),
                Err(ApiError::General(tmp)),
            );
        }
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::DbError(err.to_string())),
            );
        }
    };

    //Snapshot the current prices. The order keeps them even if the catalog
    //changes later.
    let rows = match cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .join(JoinType::InnerJoin, cart_item::Relation::Product.def())
        .select_only()
        .column_as(cart_item::Column::Quantity, "quantity")
        .column_as(cart_item::Column::Size, "size")
        .column_as(cart_item::Column::Color, "color")
        .column_as(product::Column::Id, "product_id")
        .column_as(product::Column::Name, "name")
        .column_as(product::Column::Price, "price")
        .into_model::<CheckoutRow>()
        .all(&txn)
        .await
    {
        Ok(rows) => rows,
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::DbError(err.to_string())),
            );
        }
    };

    if rows.is_empty() {
        let tmp = "Cart is empty".to_owned();
        return to_response(
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": tmp
                })),
            ),
            Err(ApiError::General(tmp)),
        );
    }

    let total: f64 = rows
        .iter()
        .map(|row| row.quantity as f64 * row.price)
        .sum();

    let new_order = order::ActiveModel {
        status: Set(order::Status::Created),
        user_id: Set(user_id),
        total_cost: Set(total),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let placed = match new_order.insert(&txn).await {
        Ok(placed) => placed,
        Err(err) => {
            let _ = txn.rollback().await;
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::DbError(err.to_string())),
            );
        }
    };

    let order_items: Vec<order_item::ActiveModel> = rows
        .iter()
        .map(|row| order_item::ActiveModel {
            order_id: Set(placed.id),
            product_id: Set(row.product_id),
            quantity: Set(row.quantity),
            price: Set(row.price),
            size: Set(row.size.clone()),
            color: Set(row.color.clone()),
            ..Default::default()
        })
        .collect();

    let result = async {
        order_item::Entity::insert_many(order_items).exec(&txn).await?;
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        let mut cart: cart::ActiveModel = cart.into();
        cart.total_cost = Set(0.0);
        cart.update(&txn).await?;
        Ok::<(), sea_orm::DbErr>(())
    }
    .await;

    if let Err(err) = result {
        let _ = txn.rollback().await;
        return to_response(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            ),
            Err(ApiError::DbError(err.to_string())),
        );
    }

    if let Err(err) = txn.commit().await {
        return to_response(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            ),
            Err(ApiError::DbError(err.to_string())),
        );
    }

    //The order is committed at this point. Failed delivery is only logged.
    match user::Entity::find_by_id(user_id).one(&*db).await {
        Ok(Some(account)) => {
            let lines: Vec<OrderLine> = rows
                .iter()
                .map(|row| OrderLine {
                    name: row.name.clone(),
                    quantity: row.quantity,
                    price: row.price,
                })
                .collect();
            if let Err(err) = email
                .send_order_confirmation(&account.email, placed.id, &lines, total)
                .await
            {
                tracing::error!(error = %err.to_string(), "Failed to send order confirmation");
            }
        }
        _ => {
            tracing::error!(user_id, "Could not load user for order confirmation email");
        }
    }

    to_response(
        (
            StatusCode::CREATED,
            Json(json!({
                "message": "Order placed successfully",
                "order_id": placed.id,
            })),
        ),
        Ok(()),
    )
}

async fn get_my_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Response {
    list_orders(&db, Some(claims.user_id)).await
}

async fn admin_get_orders(Extension(db): Extension<Arc<DatabaseConnection>>) -> Response {
    list_orders(&db, None).await
}

async fn patch_order_status(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchOrder>,
) -> Response {
    let status = match order::Status::from_str(&payload.status) {
        Ok(status) => status,
        Err(err) => {
            return to_response(
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": err
                    })),
                ),
                Err(ApiError::ValidationFail(payload.status)),
            );
        }
    };

    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::TransactionCreationFailed),
            );
        }
    };

    match order::Entity::find_by_id(id).one(&txn).await {
        Ok(Some(entry)) => {
            let mut entry: order::ActiveModel = entry.into();
            entry.status = Set(status);
            match entry.update(&txn).await {
                Ok(_) => match txn.commit().await {
                    Ok(_) => to_response(
                        (
                            StatusCode::OK,
                            Json(json!({
                                "message": "Resource patched successfully"
                            })),
                        ),
                        Ok(()),
                    ),
                    Err(err) => to_response(
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({
                                "error": "Internal server error"
                            })),
                        ),
                        Err(ApiError::DbError(err.to_string())),
                    ),
                },
                Err(err) => {
                    let _ = txn.rollback().await;
                    to_response(
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "error": "Failed to patch this resource"
                            })),
                        ),
                        Err(ApiError::DbError(err.to_string())),
                    )
                }
            }
        }
        Ok(None) => {
            let tmp = format!("No order with {} id was found", id);
            to_response(
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": tmp
                    })),
                ),
                Err(ApiError::General(tmp)),
            )
        }
        Err(err) => to_response(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            ),
            Err(ApiError::DbError(err.to_string())),
        ),
    }
}

//utilities
async fn list_orders(db: &DatabaseConnection, user_id: Option<i32>) -> Response {
    let mut finder = order::Entity::find().order_by_desc(order::Column::Id);
    if let Some(user_id) = user_id {
        finder = finder.filter(order::Column::UserId.eq(user_id));
    }

    let orders = match finder.all(db).await {
        Ok(orders) => orders,
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::DbError(err.to_string())),
            );
        }
    };

    let mut order_list = Vec::new();
    for entry in orders {
        let items = match order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(entry.id))
            .join(JoinType::InnerJoin, order_item::Relation::Product.def())
            .select_only()
            .column_as(order_item::Column::Id, "id")
            .column_as(order_item::Column::Quantity, "quantity")
            .column_as(order_item::Column::Price, "price")
            .column_as(order_item::Column::Size, "size")
            .column_as(order_item::Column::Color, "color")
            .column_as(product::Column::Id, "product_id")
            .column_as(product::Column::Name, "product_name")
            .into_model::<OrderItemView>()
            .all(db)
            .await
        {
            Ok(items) => items,
            Err(err) => {
                return to_response(
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({
                            "error": "Internal server error"
                        })),
                    ),
                    Err(ApiError::DbError(err.to_string())),
                );
            }
        };

        order_list.push(OrderView {
            id: entry.id,
            user_id: entry.user_id,
            status: entry.status,
            total_cost: entry.total_cost,
            created_at: entry.created_at.to_rfc3339(),
            items,
        });
    }

    to_response(Json(order_list), Ok(()))
}

//Structs
#[derive(Deserialize)]
struct PatchOrder {
    status: String,
}

#[derive(Debug, FromQueryResult)]
struct CheckoutRow {
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
    product_id: i32,
    name: String,
    price: f64,
}

#[derive(Debug, Serialize, FromQueryResult)]
struct OrderItemView {
    id: i32,
    quantity: u32,
    price: f64,
    size: Option<String>,
    color: Option<String>,
    product_id: i32,
    product_name: String,
}

#[derive(Debug, Serialize)]
struct OrderView {
    id: i32,
    user_id: i32,
    status: order::Status,
    total_cost: f64,
    created_at: String,
    items: Vec<OrderItemView>,
}
