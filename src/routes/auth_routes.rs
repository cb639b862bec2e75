use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_sessions::Session;

use crate::email::EmailClient;
use crate::entities::user::{self, Entity as UserEntity, Role};
use crate::middleware::{
    auth::{auth_middleware, generate_token, AuthState},
    logging::{to_response, ApiError},
};
use crate::routes::cart_routes::merge_guest_cart;

pub fn auth_routes() -> Router {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login))
}

pub fn admin_users_routes(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/user", get(get_users).post(create_user))
        .route("/user/{id}", delete(admin_delete_user).patch(patch_user))
        .layer(axum::middleware::from_fn_with_state(
            AuthState {
                db,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}

// ROUTES
async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(email): Extension<Arc<EmailClient>>,
    Json(payload): Json<CreateUser>,
) -> Response {
    if payload.username.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
        let tmp = "Username, email and password are required".to_owned();
        return to_response(
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": tmp
                })),
            ),
            Err(ApiError::ValidationFail(tmp)),
        );
    }

    let password = match hash_password(&payload.password) {
        Ok(password) => password,
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "An internal server error occured"
                    })),
                ),
                Err(ApiError::PasswordHashFailed(err.to_string())),
            );
        }
    };

    let new_user = user::ActiveModel {
        username: Set(payload.username.clone()),
        email: Set(payload.email.clone()),
        password: Set(password),
        role: Set(Role::User),
        ..Default::default()
    };

    match user::Entity::insert(new_user).exec(&*db).await {
        Ok(_) => {
            //Failed delivery is logged, the account exists either way.
            if let Err(err) = email.send_welcome(&payload.email, &payload.username).await {
                tracing::error!(error = %err.to_string(), "Failed to send welcome email");
            }
            to_response(
                (
                    StatusCode::CREATED,
                    Json(json!({
                        "message": "User registered successfully"
                    })),
                ),
                Ok(()),
            )
        }
        Err(err) => to_response(
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "Username or email already exists"
                })),
            ),
            Err(ApiError::DbError(err.to_string())),
        ),
    }
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    session: Session,
    Json(payload): Json<UserLogin>,
) -> Response {
    let result = UserEntity::find()
        .filter(user::Column::Username.eq(&*payload.username))
        .one(&*db)
        .await;

    let model = match result {
        Ok(Some(model)) => model,
        Ok(None) => {
            let tmp = "Invalid username or password".to_owned();
            return to_response(
                (
                    StatusCode::UNAUTHORIZED,
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
                        "error": "An internal server error occured"
                    })),
                ),
                Err(ApiError::DbError(err.to_string())),
            );
        }
    };

    if model.check_hash(&payload.password).is_err() {
        let tmp = "Invalid username or password".to_owned();
        return to_response(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": tmp
                })),
            ),
            Err(ApiError::General(tmp)),
        );
    }

    let token = match generate_token(model.id, model.role.to_string()).await {
        Ok(token) => token,
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error"
                    })),
                ),
                Err(ApiError::TokenGenerationFailed(err.to_string())),
            );
        }
    };

    //Whatever the visitor put in the cart before logging in moves over to
    //the account now. A failed add aborts the merge and fails the login.
    match merge_guest_cart(&db, &session, model.id).await {
        Ok(merged) if merged > 0 => {
            tracing::info!(user_id = model.id, merged, "Merged guest cart on login");
        }
        Ok(_) => {}
        Err(err) => {
            return to_response(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Failed to merge the guest cart"
                    })),
                ),
                Err(err),
            );
        }
    }

    to_response(
        (
            StatusCode::OK,
            Json(json!({
                "token": token
            })),
        ),
        Ok(()),
    )
}

async fn create_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<AdminCreateUser>,
) -> impl IntoResponse {
    let password = match hash_password(&payload.password) {
        Ok(password) => password,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "An internal server error occured"
                })),
            );
        }
    };

    let new_user = user::ActiveModel {
        username: Set(payload.username),
        email: Set(payload.email),
        password: Set(password),
        role: Set(payload.role),
        ..Default::default()
    };

    match user::Entity::insert(new_user).exec(&*db).await {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "User registered successfully"
            })),
        ),
        Err(_) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Username or email already exists"
            })),
        ),
    }
}

async fn get_users(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<UsersQuery>,
) -> impl IntoResponse {
    let order = match query.order.as_deref() {
        Some("desc") => sea_orm::Order::Desc,
        _ => sea_orm::Order::Asc,
    };

    let sort_users = match query.sort_by.as_deref() {
        Some("username") => user::Column::Username,
        Some("role") => user::Column::Role,
        _ => user::Column::Id,
    };

    let mut user_finder = user::Entity::find();

    if let Some(role) = query.role {
        user_finder = user_finder.filter(user::Column::Role.eq(role));
    }

    if let Some(query) = query.query {
        let mut query_condition =
            Condition::any().add(user::Column::Username.contains(query.clone()));
        let id_search = query.parse::<u32>().ok();
        if let Some(id) = id_search {
            query_condition = query_condition.add(user::Column::Id.eq(id));
        }

        user_finder = user_finder.filter(query_condition);
    }

    let users: Vec<AdminUserResponse> = match user_finder
        .order_by(sort_users, order)
        .select_only() //to select specific columns
        .column_as(user::Column::Id, "id")
        .column_as(user::Column::Role, "role")
        .column_as(user::Column::Username, "username")
        .column_as(user::Column::Email, "email")
        .into_model::<AdminUserResponse>()
        .all(&*db)
        .await
    {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            )
                .into_response();
        }
    };

    Json(users).into_response()
}

async fn admin_delete_user(
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

    match UserEntity::find_by_id(id).one(&txn).await {
        Ok(Some(entry)) => {
            let entry: user::ActiveModel = entry.into();
            let result = entry.delete(&txn).await;
            match result {
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

async fn patch_user(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchUser>,
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

    match UserEntity::find_by_id(id).one(&txn).await {
        Ok(Some(user)) => {
            let mut user: user::ActiveModel = user.into();

            if let Some(username) = payload.username {
                if username != "" {
                    user.username = Set(username);
                }
            }

            if let Some(email) = payload.email {
                if email != "" {
                    user.email = Set(email);
                }
            }

            if let Some(password) = payload.password {
                if password != "" {
                    let password = match hash_password(&password) {
                        Ok(password) => password,
                        Err(_) => {
                            return (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                Json(json!({
                                    "error": "An internal server error occured"
                                })),
                            );
                        }
                    };
                    user.password = Set(password);
                }
            }

            if let Some(role) = payload.role {
                user.role = Set(role);
            }

            let result: Result<(), DbErr> = user.update(&txn).await.map(|_| ());

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
                            "error": "Username unique constraint failed"
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

//utilities
fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string();

    Ok(password_hash)
}

//structs
#[derive(Deserialize, Clone, Debug)]
struct CreateUser {
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize, Clone, Debug)]
struct AdminCreateUser {
    username: String,
    email: String,
    password: String,
    role: Role,
}

#[derive(Debug, Deserialize, Clone)]
struct UserLogin {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct PatchUser {
    role: Option<Role>,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize, Serialize, FromQueryResult)]
struct AdminUserResponse {
    id: i32,
    username: String,
    email: String,
    role: Role,
}

#[derive(Deserialize)]
struct UsersQuery {
    //Query
    query: Option<String>,
    //Sort zone
    sort_by: Option<String>,
    order: Option<String>,
    //filter zone
    role: Option<Role>,
}
