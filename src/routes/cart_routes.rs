use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, patch},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, FromQueryResult, JoinType, QueryFilter, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_sessions::Session;

use crate::entities::{cart, cart_item, product};
use crate::middleware::{
    auth::{identity_middleware, Identity},
    logging::{to_response, ApiError},
};
use crate::session_cart::{GuestCart, GuestItem};

//ROUTERS
//No role gate here: the same surface serves guests (session cart) and
//authenticated users (database cart), picked apart by the identity layer.
pub fn cart_routes(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/cart/{id}", patch(patch_entry).delete(remove_entry))
        .layer(middleware::from_fn_with_state(db, identity_middleware))
}

//Routes
async fn get_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(identity): Extension<Identity>,
    session: Session,
) -> Response {
    match identity.0 {
        Some(claims) => get_user_cart(&db, claims.user_id).await,
        None => get_guest_cart(&db, &session).await,
    }
}

async fn get_user_cart(db: &DatabaseConnection, user_id: i32) -> Response {
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

    let cart = match find_or_create_cart(&txn, user_id).await {
        Ok(cart) => cart,
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

    let rows = match cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .join(JoinType::InnerJoin, cart_item::Relation::Product.def())
        .select_only()
        .column_as(cart_item::Column::Id, "id")
        .column_as(cart_item::Column::Quantity, "quantity")
        .column_as(cart_item::Column::Size, "size")
        .column_as(cart_item::Column::Color, "color")
        .column_as(product::Column::Id, "product_id")
        .column_as(product::Column::Name, "name")
        .column_as(product::Column::Price, "price")
        .column_as(product::Column::Stock, "stock")
        .column_as(product::Column::IsAvailable, "is_available")
        .into_model::<UserCartRow>()
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

    let item_count: u32 = rows.iter().map(|row| row.quantity).sum();
    let items: Vec<CartItemView> = rows
        .into_iter()
        .map(|row| CartItemView {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            quantity: row.quantity,
            size: row.size,
            color: row.color,
            stock: row.stock,
            is_available: row.is_available,
            line_total: row.price * row.quantity as f64,
        })
        .collect();

    to_response(
        Json(json!({
            "items": items,
            "total_cost": cart.total_cost,
            "item_count": item_count,
        })),
        Ok(()),
    )
}

async fn get_guest_cart(db: &DatabaseConnection, session: &Session) -> Response {
    let mut guest = match GuestCart::load(session).await {
        Ok(guest) => guest,
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(err),
            );
        }
    };

    //One batched lookup for all referenced products.
    let products = match lookup_products(db, &guest.items).await {
        Ok(products) => products,
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

    let prices = products
        .iter()
        .map(|(id, model)| (*id, model.price))
        .collect();
    guest.recompute_total(&prices);

    let items: Vec<CartItemView> = guest
        .items
        .iter()
        .map(|item| match products.get(&item.product_id) {
            Some(model) => CartItemView {
                id: item.id,
                product_id: item.product_id,
                name: model.name.clone(),
                price: model.price,
                quantity: item.quantity,
                size: item.size.clone(),
                color: item.color.clone(),
                stock: model.stock,
                is_available: model.is_available,
                line_total: model.price * item.quantity as f64,
            },
            //Product vanished since it was added, keep the row visible.
            None => CartItemView {
                id: item.id,
                product_id: item.product_id,
                name: "Unavailable product".to_owned(),
                price: 0.0,
                quantity: item.quantity,
                size: item.size.clone(),
                color: item.color.clone(),
                stock: 0,
                is_available: false,
                line_total: 0.0,
            },
        })
        .collect();

    to_response(
        Json(json!({
            "items": items,
            "total_cost": guest.total_cost,
            "item_count": guest.item_count,
        })),
        Ok(()),
    )
}

async fn add_to_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(identity): Extension<Identity>,
    session: Session,
    Json(payload): Json<AddToCart>,
) -> Response {
    if payload.quantity == 0 {
        let tmp = "Quantity should be greater than 0".to_owned();
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

    match identity.0 {
        Some(claims) => {
            match add_to_user_cart(
                &db,
                claims.user_id,
                payload.product_id,
                payload.quantity,
                payload.size,
                payload.color,
            )
            .await
            {
                Ok(_) => to_response(
                    (
                        StatusCode::CREATED,
                        Json(json!({
                            "message": "Added successfully"
                        })),
                    ),
                    Ok(()),
                ),
                Err(err) => error_response(err),
            }
        }
        None => {
            //Guest path: the entry lives in the session, not the database.
            match product::Entity::find_by_id(payload.product_id).one(&*db).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    let tmp = format!("No product with {} id was found", payload.product_id);
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
            }

            let mut guest = match GuestCart::load(&session).await {
                Ok(guest) => guest,
                Err(err) => return error_response(err),
            };
            guest.add_item(
                payload.product_id,
                payload.quantity,
                payload.size,
                payload.color,
            );
            if let Err(err) = refresh_guest_totals(&db, &mut guest).await {
                return error_response(err);
            }
            if let Err(err) = guest.save(&session).await {
                return error_response(err);
            }
            to_response(
                (
                    StatusCode::CREATED,
                    Json(json!({
                        "message": "Added successfully"
                    })),
                ),
                Ok(()),
            )
        }
    }
}

async fn patch_entry(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(identity): Extension<Identity>,
    session: Session,
    Json(payload): Json<PatchCartEntry>,
) -> Response {
    match identity.0 {
        Some(claims) => mutate_user_entry(&db, claims.user_id, id, Some(payload.quantity)).await,
        None => {
            let mut guest = match GuestCart::load(&session).await {
                Ok(guest) => guest,
                Err(err) => return error_response(err),
            };
            if let Err(err) = guest.update_quantity(id, payload.quantity) {
                return error_response(err);
            }
            if let Err(err) = refresh_guest_totals(&db, &mut guest).await {
                return error_response(err);
            }
            if let Err(err) = guest.save(&session).await {
                return error_response(err);
            }
            to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Resource patched successfully"
                    })),
                ),
                Ok(()),
            )
        }
    }
}

async fn remove_entry(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(identity): Extension<Identity>,
    session: Session,
) -> Response {
    match identity.0 {
        Some(claims) => mutate_user_entry(&db, claims.user_id, id, None).await,
        None => {
            let mut guest = match GuestCart::load(&session).await {
                Ok(guest) => guest,
                Err(err) => return error_response(err),
            };
            if let Err(err) = guest.remove_item(id) {
                return error_response(err);
            }
            if let Err(err) = refresh_guest_totals(&db, &mut guest).await {
                return error_response(err);
            }
            if let Err(err) = guest.save(&session).await {
                return error_response(err);
            }
            to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Resource deleted successfully"
                    })),
                ),
                Ok(()),
            )
        }
    }
}

async fn clear_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(identity): Extension<Identity>,
    session: Session,
) -> Response {
    match identity.0 {
        Some(claims) => {
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

            //Clearing a cart that was never created still succeeds.
            let cart = match cart::Entity::find()
                .filter(cart::Column::UserId.eq(claims.user_id))
                .one(&txn)
                .await
            {
                Ok(Some(cart)) => cart,
                Ok(None) => {
                    return to_response(
                        (
                            StatusCode::OK,
                            Json(json!({
                                "message": "Cart cleared"
                            })),
                        ),
                        Ok(()),
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

            let result: Result<(), DbErr> = async {
                cart_item::Entity::delete_many()
                    .filter(cart_item::Column::CartId.eq(cart.id))
                    .exec(&txn)
                    .await?;
                let mut cart: cart::ActiveModel = cart.into();
                cart.total_cost = Set(0.0);
                cart.update(&txn).await?;
                Ok(())
            }
            .await;

            match result {
                Ok(_) => match txn.commit().await {
                    Ok(_) => to_response(
                        (
                            StatusCode::OK,
                            Json(json!({
                                "message": "Cart cleared"
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
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({
                                "error": "Failed to clear the cart"
                            })),
                        ),
                        Err(ApiError::DbError(err.to_string())),
                    )
                }
            }
        }
        None => {
            let mut guest = match GuestCart::load(&session).await {
                Ok(guest) => guest,
                Err(err) => return error_response(err),
            };
            guest.clear();
            if let Err(err) = guest.save(&session).await {
                return error_response(err);
            }
            to_response(
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Cart cleared"
                    })),
                ),
                Ok(()),
            )
        }
    }
}

//utilities

//Shared by the add handler and the login-time merge. One transaction per
//call: the merge deliberately does not span its adds with a transaction.
pub async fn add_to_user_cart(
    db: &DatabaseConnection,
    user_id: i32,
    product_id: i32,
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
) -> Result<(), ApiError> {
    if quantity == 0 {
        return Err(ApiError::General(
            "Quantity should be greater than 0".to_owned(),
        ));
    }

    let txn = db
        .begin()
        .await
        .map_err(|_| ApiError::TransactionCreationFailed)?;

    match product::Entity::find_by_id(product_id).one(&txn).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Err(ApiError::General(format!(
                "No product with {} id was found",
                product_id
            )));
        }
        Err(err) => {
            return Err(ApiError::DbError(err.to_string()));
        }
    }

    let cart = find_or_create_cart(&txn, user_id)
        .await
        .map_err(|err| ApiError::DbError(err.to_string()))?;

    //Coalesce by the (product, size, color) variant key.
    let mut condition = Condition::all()
        .add(cart_item::Column::CartId.eq(cart.id))
        .add(cart_item::Column::ProductId.eq(product_id));
    condition = match &size {
        Some(value) => condition.add(cart_item::Column::Size.eq(value.clone())),
        None => condition.add(cart_item::Column::Size.is_null()),
    };
    condition = match &color {
        Some(value) => condition.add(cart_item::Column::Color.eq(value.clone())),
        None => condition.add(cart_item::Column::Color.is_null()),
    };

    let existing = cart_item::Entity::find()
        .filter(condition)
        .one(&txn)
        .await
        .map_err(|err| ApiError::DbError(err.to_string()))?;

    let result: Result<(), DbErr> = match existing {
        Some(entry) => {
            let current = entry.quantity;
            let mut entry: cart_item::ActiveModel = entry.into();
            entry.quantity = Set(current.saturating_add(quantity));
            entry.update(&txn).await.map(|_| ())
        }
        None => {
            let new_entry = cart_item::ActiveModel {
                cart_id: Set(cart.id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                size: Set(size),
                color: Set(color),
                ..Default::default()
            };
            cart_item::Entity::insert(new_entry).exec(&txn).await.map(|_| ())
        }
    };

    if let Err(err) = result {
        let _ = txn.rollback().await;
        return Err(ApiError::DbError(err.to_string()));
    }

    if let Err(err) = recompute_cart_total(&txn, cart.id).await {
        let _ = txn.rollback().await;
        return Err(ApiError::DbError(err.to_string()));
    }

    txn.commit()
        .await
        .map_err(|err| ApiError::DbError(err.to_string()))
}

//Called once at login. Aborts on the first failing add; items merged before
//the failure stay in the user cart and the session cart is left untouched.
pub async fn merge_guest_cart(
    db: &DatabaseConnection,
    session: &Session,
    user_id: i32,
) -> Result<u32, ApiError> {
    let guest = GuestCart::load(session).await?;
    if guest.is_empty() {
        return Ok(0);
    }

    let mut merged = 0;
    for item in &guest.items {
        add_to_user_cart(
            db,
            user_id,
            item.product_id,
            item.quantity,
            item.size.clone(),
            item.color.clone(),
        )
        .await?;
        merged += 1;
    }

    GuestCart::clear_session(session).await?;
    Ok(merged)
}

//Patch (Some(quantity), 0 deletes) or remove (None) one entry of the user's cart.
async fn mutate_user_entry(
    db: &DatabaseConnection,
    user_id: i32,
    entry_id: i32,
    quantity: Option<u32>,
) -> Response {
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
            return to_response(
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Cart not found"
                    })),
                ),
                Err(ApiError::CartNotFound),
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

    match cart_item::Entity::find_by_id(entry_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(&txn)
        .await
    {
        Ok(Some(entry)) => {
            let entry: cart_item::ActiveModel = entry.into();
            let result: Result<(), DbErr> = match quantity {
                Some(0) | None => entry.delete(&txn).await.map(|_| ()),
                Some(value) => {
                    let mut entry = entry;
                    entry.quantity = Set(value);
                    entry.update(&txn).await.map(|_| ())
                }
            };

            let result = match result {
                Ok(_) => recompute_cart_total(&txn, cart.id).await.map(|_| ()),
                Err(err) => Err(err),
            };

            let message = match quantity {
                Some(_) => "Resource patched successfully",
                None => "Resource deleted successfully",
            };
            match result {
                Ok(_) => match txn.commit().await {
                    Ok(_) => to_response(
                        (
                            StatusCode::OK,
                            Json(json!({
                                "message": message
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
            let tmp = format!("No related entry with {} id was found.", entry_id);
            to_response(
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": tmp
                    })),
                ),
                Err(ApiError::ItemNotFound(entry_id)),
            )
        }
        Err(err) => to_response(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error."
                })),
            ),
            Err(ApiError::DbError(err.to_string())),
        ),
    }
}

async fn find_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<cart::Model, DbErr> {
    if let Some(cart) = cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        return Ok(cart);
    }

    let new_cart = cart::ActiveModel {
        user_id: Set(user_id),
        total_cost: Set(0.0),
        ..Default::default()
    };
    new_cart.insert(conn).await
}

//Sum of quantity x current price over the joined line items, written back
//onto the cart row.
async fn recompute_cart_total<C: ConnectionTrait>(conn: &C, cart_id: i32) -> Result<f64, DbErr> {
    let rows = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .join(JoinType::InnerJoin, cart_item::Relation::Product.def())
        .select_only()
        .column_as(cart_item::Column::Quantity, "quantity")
        .column_as(product::Column::Price, "price")
        .into_model::<QuantityPrice>()
        .all(conn)
        .await?;

    let total: f64 = rows
        .iter()
        .map(|row| row.quantity as f64 * row.price)
        .sum();

    if let Some(cart) = cart::Entity::find_by_id(cart_id).one(conn).await? {
        let mut cart: cart::ActiveModel = cart.into();
        cart.total_cost = Set(total);
        cart.update(conn).await?;
    }

    Ok(total)
}

async fn lookup_products(
    db: &DatabaseConnection,
    items: &[GuestItem],
) -> Result<HashMap<i32, product::Model>, DbErr> {
    let ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let products = product::Entity::find()
        .filter(product::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(products.into_iter().map(|model| (model.id, model)).collect())
}

async fn refresh_guest_totals(
    db: &DatabaseConnection,
    guest: &mut GuestCart,
) -> Result<(), ApiError> {
    let products = lookup_products(db, &guest.items)
        .await
        .map_err(|err| ApiError::DbError(err.to_string()))?;
    let prices = products
        .iter()
        .map(|(id, model)| (*id, model.price))
        .collect();
    guest.recompute_total(&prices);
    Ok(())
}

fn error_response(err: ApiError) -> Response {
    let (status, message) = match &err {
        ApiError::General(value) => (StatusCode::BAD_REQUEST, value.clone()),
        ApiError::CartNotFound => (StatusCode::BAD_REQUEST, "Cart not found".to_owned()),
        ApiError::ItemNotFound(id) => (
            StatusCode::BAD_REQUEST,
            format!("No related entry with {} id was found.", id),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_owned(),
        ),
    };
    to_response(
        (
            status,
            Json(json!({
                "error": message
            })),
        ),
        Err(err),
    )
}

//Structs
#[derive(Deserialize, Debug)]
struct AddToCart {
    product_id: i32,
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
}

#[derive(Deserialize)]
struct PatchCartEntry {
    quantity: u32,
}

#[derive(Debug, Deserialize, FromQueryResult)]
struct UserCartRow {
    id: i32,
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
    product_id: i32,
    name: String,
    price: f64,
    stock: i32,
    is_available: bool,
}

#[derive(Debug, FromQueryResult)]
struct QuantityPrice {
    quantity: u32,
    price: f64,
}

#[derive(Debug, Serialize)]
struct CartItemView {
    id: i32,
    product_id: i32,
    name: String,
    price: f64,
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
    stock: i32,
    is_available: bool,
    line_total: f64,
}
