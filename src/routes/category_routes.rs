use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::entities::{category, category::Entity as CategoryEntity, user::Role};
use crate::middleware::auth::{auth_middleware, AuthState};

//ROUTERS
pub fn category_routes() -> Router {
    Router::new()
        .route("/category", get(get_categories))
        .route("/category/{id}", get(get_category))
}

pub fn admin_category_routes(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/category", post(create_category).get(admin_get_categories))
        .route(
            "/category/{id}",
            patch(patch_category).delete(delete_category),
        )
        .layer(axum::middleware::from_fn_with_state(
            AuthState {
                db,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}

//ROUTES
async fn create_category(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateCategory>,
) -> impl IntoResponse {
    //IF MODEL CHANGES DEFAULT VALUE -> NEED TO CHANGE HERE TOO
    let new_category = category::ActiveModel {
        name: Set(payload.name),
        is_available: Set(payload.is_available.unwrap_or(true)),
        ..Default::default()
    };

    match category::Entity::insert(new_category).exec(&*db).await {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Category created successfully"
            })),
        ),
        Err(_) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Category already exists"
            })),
        ),
    }
}

async fn get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<CategoriesQuery>,
) -> impl IntoResponse {
    let mut condition = Condition::all().add(category::Column::IsAvailable.eq(true));

    if let Some(query) = query.query {
        condition = condition.add(category::Column::Name.contains(query));
    }

    match CategoryEntity::find()
        .filter(condition)
        .order_by_asc(category::Column::Name)
        .all(&*db)
        .await
    {
        Ok(categories) => (StatusCode::OK, Json(categories)).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error"
            })),
        )
            .into_response(),
    }
}

async fn get_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> impl IntoResponse {
    match CategoryEntity::find_by_id(id)
        .filter(category::Column::IsAvailable.eq(true))
        .one(&*db)
        .await
    {
        Ok(Some(category)) => (StatusCode::OK, Json(category)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("No category with {} id was found", id)
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

async fn admin_get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<CategoriesQuery>,
) -> impl IntoResponse {
    let condition = if let Some(query) = query.query {
        Condition::all().add(category::Column::Name.contains(query))
    } else {
        Condition::all()
    };

    match CategoryEntity::find()
        .filter(condition)
        .order_by_asc(category::Column::Id)
        .all(&*db)
        .await
    {
        Ok(categories) => (StatusCode::OK, Json(categories)).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error"
            })),
        )
            .into_response(),
    }
}

async fn patch_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchCategory>,
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

    match CategoryEntity::find_by_id(id).one(&txn).await {
        Ok(Some(category)) => {
            let mut category: category::ActiveModel = category.into();

            if let Some(name) = payload.name {
                if name != "" {
                    category.name = Set(name);
                }
            }
            if let Some(is_available) = payload.is_available {
                category.is_available = Set(is_available);
            }

            match category.update(&txn).await {
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
                "error": format!("No category with {} id was found", id)
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

async fn delete_category(
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

    match CategoryEntity::find_by_id(id).one(&txn).await {
        Ok(Some(category)) => {
            let category: category::ActiveModel = category.into();
            match category.delete(&txn).await {
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
struct CreateCategory {
    name: String,
    is_available: Option<bool>,
}

#[derive(Deserialize)]
struct PatchCategory {
    name: Option<String>,
    is_available: Option<bool>,
}

#[derive(Deserialize)]
struct CategoriesQuery {
    query: Option<String>,
}
