use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;

use rust_lavka::api_router;
use rust_lavka::email::EmailClient;
use rust_lavka::entities::{primary_setup, setup_schema};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").expect("Database url must be set");
    let db: DatabaseConnection = Database::connect(&database_url).await.unwrap();
    setup_schema(&db).await;

    let shared_db = Arc::new(db);

    primary_setup(shared_db.clone()).await;

    let email = Arc::new(EmailClient::from_env());

    let app = api_router(shared_db, email);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    println!("Running at {:?}", listener);
    axum::serve(listener, app).await.unwrap();
}
