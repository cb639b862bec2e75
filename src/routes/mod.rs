pub mod auth_routes;
pub mod cart_routes;
pub mod category_routes;
pub mod order_routes;
pub mod product_routes;
pub mod profile_routes;
pub mod settings_routes;
pub mod upload_routes;

use axum::{middleware, Extension, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::email::EmailClient;
use crate::middleware::logging::logging_middleware;

use self::{
    auth_routes::{admin_users_routes, auth_routes},
    cart_routes::cart_routes,
    category_routes::{admin_category_routes, category_routes},
    order_routes::{admin_order_routes, order_routes},
    product_routes::{admin_product_routes, product_routes},
    profile_routes::profile_routes,
    settings_routes::{admin_settings_routes, settings_routes},
    upload_routes::{public_image_router, upload_routes},
};

pub fn api_router(db: Arc<DatabaseConnection>, email: Arc<EmailClient>) -> Router {
    let user_routes = auth_routes();
    let category_routes = category_routes();
    let admin_category_routes = admin_category_routes(db.clone());
    let product_routes = product_routes();
    let admin_product_routes = admin_product_routes(db.clone());
    let upload_routes = upload_routes(db.clone());
    let cart_routes = cart_routes(db.clone());
    let order_routes = order_routes(db.clone());
    let admin_order_routes = admin_order_routes(db.clone());
    let settings_routes = settings_routes();
    let admin_settings_routes = admin_settings_routes(db.clone());
    let public_image_router = public_image_router();
    let profile_router = profile_routes(db.clone());
    let admin_users_router = admin_users_routes(db.clone());

    //The guest cart lives in the session, so the session layer wraps the
    //whole API surface.
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::days(7)));

    Router::new()
        .merge(user_routes)
        .merge(public_image_router)
        .nest("/api", category_routes)
        .nest("/api", product_routes)
        .nest("/api", cart_routes)
        .nest("/api", order_routes)
        .nest("/api", settings_routes)
        .nest("/api", profile_router)
        .nest("/api/admin", admin_category_routes)
        .nest("/api/admin", admin_product_routes)
        .nest("/api/admin", upload_routes)
        .nest("/api/admin", admin_order_routes)
        .nest("/api/admin", admin_settings_routes)
        .nest("/api/admin", admin_users_router)
        .layer(Extension(db))
        .layer(Extension(email))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(logging_middleware))
}
