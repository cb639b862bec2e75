use crate::entities::cart::Entity as Cart;
use crate::entities::product::Entity as Product;
use sea_orm::entity::prelude::*;
use serde::Serialize;

//Line items are distinguished by (product, size, color) within a cart.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "cart_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub cart_id: i32,
    pub product_id: i32,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Cart",
        from = "crate::entities::cart_item::Column::CartId",
        to = "crate::entities::cart::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Cart,
    #[sea_orm(
        belongs_to = "Product",
        from = "crate::entities::cart_item::Column::ProductId",
        to = "crate::entities::product::Column::Id",
    )]
    Product,
}

impl Related<crate::entities::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl Related<crate::entities::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
