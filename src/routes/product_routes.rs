use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::entities::{
    category, image, product, product::Entity as ProductEntity, user::Role,
};
use crate::middleware::auth::{auth_middleware, AuthState};

//ROUTERS
pub fn product_routes() -> Router {
    Router::new()
        .route("/product", get(get_products))
        .route("/product/{id}", get(get_product))
}

pub fn admin_product_routes(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/product", post(create_product).get(admin_get_products))
        .route("/product/{id}", patch(patch_product).delete(delete_product))
        .layer(axum::middleware::from_fn_with_state(
            AuthState {
                db,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}

//ROUTES
async fn get_products(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<ProductsQuery>,
) -> impl IntoResponse {
    let mut condition = Condition::all().add(product::Column::IsAvailable.eq(true));

    //Filter zone
    if let Some(price_bottom) = query.price_bottom {
        condition = condition.add(product::Column::Price.gte(price_bottom));
    }
    if let Some(price_top) = query.price_top {
        condition = condition.add(product::Column::Price.lte(price_top));
    }
    if let Some(category_id) = query.category_id {
        condition = condition.add(product::Column::CategoryId.eq(category_id));
    }
    if query.only_featured.unwrap_or(false) {
        condition = condition.add(product::Column::IsFeatured.eq(true));
    }
    if let Some(query) = query.query {
        condition = condition.add(product::Column::Name.contains(query));
    }

    //Sorting zone
    let order = match query.order.as_deref() {
        Some("desc") => sea_orm::Order::Desc,
        _ => sea_orm::Order::Asc,
    };
    let sort_column = match query.sort_by.as_deref() {
        Some("price") => product::Column::Price,
        Some("stock") => product::Column::Stock,
        _ => product::Column::Name,
    };

    //Pagination zone. Pages are 1-based, anything below clamps to the first.
    let page: u64 = query.page.unwrap_or(1).max(1);
    let page_size: u64 = query.page_size.unwrap_or(10);

    match ProductEntity::find()
        .filter(condition)
        .order_by(sort_column, order)
        .limit(page_size)
        .offset((page - 1) * page_size)
        .all(&*db)
        .await
    {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error"
            })),
        )
            .into_response(),
    }
}

async fn get_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> impl IntoResponse {
    match ProductEntity::find_by_id(id)
        .filter(product::Column::IsAvailable.eq(true))
        .one(&*db)
        .await
    {
        Ok(Some(product)) => (StatusCode::OK, Json(product)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("No product with {} id was found", id)
            })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error"
            })),
        )
            .into_response(),
    }
}

async fn admin_get_products(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<ProductsQuery>,
) -> impl IntoResponse {
    let condition = if let Some(query) = query.query {
        Condition::all().add(product::Column::Name.contains(query))
    } else {
        Condition::all()
    };

    match ProductEntity::find()
        .filter(condition)
        .order_by_asc(product::Column::Id)
        .all(&*db)
        .await
    {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error"
            })),
        )
            .into_response(),
    }
}

async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateProduct>,
) -> impl IntoResponse {
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            );
        }
    };

    match category::Entity::find_by_id(payload.category_id).one(&txn).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": format!("Category with id {} not found", payload.category_id)
                })),
            );
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            );
        }
    }

    if let Some(image_id) = payload.image_id {
        match image::Entity::find_by_id(image_id).one(&txn).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "error": format!("Image with id {} not found", image_id)
                    })),
                );
            }
            Err(_) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                );
            }
        }
    }

    //IF MODEL CHANGES DEFAULT VALUE -> NEED TO CHANGE HERE TOO
    let new_product = product::ActiveModel {
        name: Set(payload.name),
        price: Set(payload.price),
        description: Set(payload.description.unwrap_or_default()),
        stock: Set(payload.stock.unwrap_or(0)),
        image_id: Set(payload.image_id),
        category_id: Set(payload.category_id),
        is_featured: Set(payload.is_featured.unwrap_or(false)),
        is_available: Set(payload.is_available.unwrap_or(true)),
        ..Default::default()
    };

    match product::Entity::insert(new_product).exec(&txn).await {
        Ok(_) => match txn.commit().await {
            Ok(_) => (
                StatusCode::CREATED,
                Json(json!({
                    "message": "Product created successfully"
                })),
            ),
            Err(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            ),
        },
        Err(_) => {
            let _ = txn.rollback().await;
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "Product already exists"
                })),
            )
        }
    }
}

async fn patch_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchProduct>,
) -> impl IntoResponse {
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            );
        }
    };

    match ProductEntity::find_by_id(id).one(&txn).await {
        Ok(Some(product)) => {
            let mut product: product::ActiveModel = product.into();

            if let Some(name) = payload.name {
                if name != "" {
                    product.name = Set(name);
                }
            }
            if let Some(price) = payload.price {
                product.price = Set(price);
            }
            if let Some(description) = payload.description {
                product.description = Set(description);
            }
            if let Some(stock) = payload.stock {
                product.stock = Set(stock);
            }
            if let Some(category_id) = payload.category_id {
                product.category_id = Set(category_id);
            }
            if let Some(is_featured) = payload.is_featured {
                product.is_featured = Set(is_featured);
            }
            if let Some(is_available) = payload.is_available {
                product.is_available = Set(is_available);
            }

            match product.update(&txn).await {
                Ok(_) => match txn.commit().await {
                    Ok(_) => (
                        StatusCode::OK,
                        Json(json!({
                            "message": "Resource patched successfully"
                        })),
                    ),
                    Err(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({
                            "error": "Internal server error"
                        })),
                    ),
                },
                Err(_) => {
                    let _ = txn.rollback().await;
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({
                            "error": "Failed to patch this resource"
                        })),
                    )
                }
            }
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("No product with {} id was found", id)
            })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error"
            })),
        ),
    }
}

async fn delete_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> impl IntoResponse {
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            );
        }
    };

    match ProductEntity::find_by_id(id).one(&txn).await {
        Ok(Some(product)) => {
            let product: product::ActiveModel = product.into();
            match product.delete(&txn).await {
                Ok(_) => {
                    let _ = txn.commit().await;
                    (
                        StatusCode::OK,
                        Json(json!({
                            "message": "Resource deleted successfully"
                        })),
                    )
                }
                Err(_) => {
                    let _ = txn.rollback().await;
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({
                            "error": "Failed to delete this resource"
                        })),
                    )
                }
            }
        }
        Ok(None) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("No related entry with {} id was found.", id)
            })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error."
            })),
        ),
    }
}

//structs
#[derive(Deserialize, Clone, Debug)]
struct CreateProduct {
    name: String,
    price: f64,
    description: Option<String>,
    stock: Option<i32>,
    image_id: Option<i32>,
    category_id: i32,
    is_featured: Option<bool>,
    is_available: Option<bool>,
}

#[derive(Deserialize)]
struct PatchProduct {
    name: Option<String>,
    price: Option<f64>,
    description: Option<String>,
    stock: Option<i32>,
    category_id: Option<i32>,
    is_featured: Option<bool>,
    is_available: Option<bool>,
}

#[derive(Deserialize)]
struct ProductsQuery {
    //Query
    query: Option<String>,
    //sort zone
    sort_by: Option<String>,
    order: Option<String>,
    //filter zone
    price_top: Option<f64>,
    price_bottom: Option<f64>,
    category_id: Option<i32>,
    only_featured: Option<bool>,
    //pagination zone
    page: Option<u64>,
    page_size: Option<u64>,
}
