use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::entities::{setting, setting::Entity as SettingEntity, user::Role};
use crate::middleware::auth::{auth_middleware, AuthState};

//ROUTERS
pub fn settings_routes() -> Router {
    Router::new().route("/settings", get(get_settings))
}

pub fn admin_settings_routes(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/settings", put(upsert_setting))
        .layer(axum::middleware::from_fn_with_state(
            AuthState {
                db,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}

//ROUTES
async fn get_settings(Extension(db): Extension<Arc<DatabaseConnection>>) -> impl IntoResponse {
    match SettingEntity::find().all(&*db).await {
        Ok(settings) => {
            let mut map = Map::new();
            for entry in settings {
                map.insert(entry.key, Value::String(entry.value));
            }
            (StatusCode::OK, Json(Value::Object(map))).into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error"
            })),
        )
            .into_response(),
    }
}

async fn upsert_setting(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<UpsertSetting>,
) -> impl IntoResponse {
    if payload.key.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Setting key is required"
            })),
        );
    }

    let existing = match SettingEntity::find()
        .filter(setting::Column::Key.eq(&*payload.key))
        .one(&*db)
        .await
    {
        Ok(existing) => existing,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            );
        }
    };

    let result = match existing {
        Some(entry) => {
            let mut entry: setting::ActiveModel = entry.into();
            entry.value = Set(payload.value);
            entry.update(&*db).await.map(|_| ())
        }
        None => {
            let new_entry = setting::ActiveModel {
                key: Set(payload.key),
                value: Set(payload.value),
                ..Default::default()
            };
            new_entry.insert(&*db).await.map(|_| ())
        }
    };

    match result {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "message": "Setting saved successfully"
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

//structs
#[derive(Deserialize, Clone, Debug)]
struct UpsertSetting {
    key: String,
    value: String,
}
