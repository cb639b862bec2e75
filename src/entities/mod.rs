pub mod cart;
pub mod cart_item;
pub mod category;
pub mod image;
pub mod order;
pub mod order_item;
pub mod product;
pub mod setting;
pub mod user;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Schema, Set, TransactionTrait};
use std::sync::Arc;

use crate::entities::{
    cart::Entity as Cart, cart_item::Entity as CartItem, category::Entity as Category,
    image::Entity as Image, order::Entity as Order, order_item::Entity as OrderItem,
    product::Entity as Product, setting::Entity as Setting, user::Entity as User,
};

pub async fn setup_schema(db: &DatabaseConnection) {
    let schema = Schema::new(db.get_database_backend());
    let create_user_table = schema.create_table_from_entity(User);
    let create_category_table = schema.create_table_from_entity(Category);
    let create_product_table = schema.create_table_from_entity(Product);
    let create_cart_table = schema.create_table_from_entity(Cart);
    let create_cart_item_table = schema.create_table_from_entity(CartItem);
    let create_order_table = schema.create_table_from_entity(Order);
    let create_order_item_table = schema.create_table_from_entity(OrderItem);
    let create_setting_table = schema.create_table_from_entity(Setting);
    let create_image_table = schema.create_table_from_entity(Image);

    db.execute(db.get_database_backend().build(&create_user_table))
        .await
        .expect("Failed to create user schema");
    db.execute(db.get_database_backend().build(&create_category_table))
        .await
        .expect("Failed to create category schema");
    db.execute(db.get_database_backend().build(&create_product_table))
        .await
        .expect("Failed to create product schema");
    db.execute(db.get_database_backend().build(&create_cart_table))
        .await
        .expect("Failed to create cart schema");
    db.execute(db.get_database_backend().build(&create_cart_item_table))
        .await
        .expect("Failed to create cart item schema");
    db.execute(db.get_database_backend().build(&create_order_table))
        .await
        .expect("Failed to create order schema");
    db.execute(db.get_database_backend().build(&create_order_item_table))
        .await
        .expect("Failed to create order item schema");
    db.execute(db.get_database_backend().build(&create_setting_table))
        .await
        .expect("Failed to create setting schema");
    db.execute(db.get_database_backend().build(&create_image_table))
        .await
        .expect("Failed to create image schema");
}

//Seeds the admin account and default store settings on a fresh database.
pub async fn primary_setup(db: Arc<DatabaseConnection>) {
    let existing = user::Entity::find()
        .filter(user::Column::Username.eq("admin"))
        .one(&*db)
        .await
        .expect("Failed to check for existing admin");
    if existing.is_some() {
        return;
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password("Secret15".as_bytes(), &salt)
        .expect("Failed to hash password")
        .to_string();

    let new_admin = user::ActiveModel {
        username: Set("admin".to_owned()),
        email: Set("admin@localhost".to_owned()),
        password: Set(password_hash),
        role: Set(user::Role::Admin),
        ..Default::default()
    };

    let default_settings = [
        ("store_name", "Lavka"),
        ("currency", "USD"),
        ("support_email", "support@localhost"),
    ]
    .map(|(key, value)| setting::ActiveModel {
        key: Set(key.to_owned()),
        value: Set(value.to_owned()),
        ..Default::default()
    });

    match db.begin().await {
        Ok(txn) => {
            if user::Entity::insert(new_admin).exec(&txn).await.is_err() {
                let _ = txn.rollback().await;
                panic!("Failed to seed the database, but setup was requested.");
            }
            if setting::Entity::insert_many(default_settings)
                .exec(&txn)
                .await
                .is_err()
            {
                let _ = txn.rollback().await;
                panic!("Failed to seed the database, but setup was requested.");
            }
            if txn.commit().await.is_err() {
                panic!("Failed to seed the database, but setup was requested.");
            }
        }
        Err(_) => {
            panic!("Failed to seed the database, but setup was requested.");
        }
    }
}
