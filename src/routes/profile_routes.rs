use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::entities::user::{ActiveModel, Entity as UserEntity, Role};
use crate::middleware::auth::{auth_middleware, AuthState, Claims};

pub fn profile_routes(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/profile", get(get_profile).patch(patch_profile))
        .layer(axum::middleware::from_fn_with_state(
            AuthState {
                db,
                role: Role::User,
            },
            auth_middleware,
        ))
}

async fn get_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    let user_id = claims.user_id;

    match UserEntity::find_by_id(user_id).one(&*db).await {
        Ok(Some(model)) => (
            StatusCode::OK,
            Json(json!({
                "username": model.username,
                "email": model.email,
            })),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Not found"
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

async fn patch_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PatchProfile>,
) -> impl IntoResponse {
    let user_id = claims.user_id;
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            )
        }
    };

    match UserEntity::find_by_id(user_id).one(&txn).await {
        Ok(Some(model)) => {
            let mut model: ActiveModel = model.into();
            if let Some(username) = payload.username {
                if username != "" {
                    model.username = Set(username);
                }
            }
            if let Some(email) = payload.email {
                if email != "" {
                    model.email = Set(email);
                }
            }
            let result = model.update(&txn).await.map(|_| ());
            match result {
                Ok(_) => match txn.commit().await {
                    Ok(_) => (
                        StatusCode::OK,
                        Json(json!({
                            "message": "Resource patched successfully"
                        })),
                    ),
                    Err(_) => (
                        StatusCode::CONFLICT,
                        Json(json!({
                            "error": "This username or email is claimed"
                        })),
                    ),
                },
                Err(_) => {
                    let _ = txn.rollback().await;
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({
                            "error": "Failed to patch this resource"
                        })),
                    );
                }
            }
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Not found"
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

#[derive(Deserialize)]
struct PatchProfile {
    username: Option<String>,
    email: Option<String>,
}
