use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower_sessions::Session;

use crate::middleware::logging::ApiError;

const CART_KEY: &str = "guest_cart";

//Cart state for visitors without an account. Lives only in the session and
//is merged into the database-backed cart when the visitor logs in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuestCart {
    pub items: Vec<GuestItem>,
    pub total_cost: f64,
    pub item_count: u32,
    next_id: i32,
}

//Guest items have no database key, so they are distinguished by
//(product, size, color) and addressed by a per-session id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuestItem {
    pub id: i32,
    pub product_id: i32,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl GuestCart {
    pub async fn load(session: &Session) -> Result<GuestCart, ApiError> {
        let cart = session
            .get::<GuestCart>(CART_KEY)
            .await
            .map_err(|err| ApiError::SessionError(err.to_string()))?
            .unwrap_or_default();
        Ok(cart)
    }

    pub async fn save(&self, session: &Session) -> Result<(), ApiError> {
        session
            .insert(CART_KEY, self.clone())
            .await
            .map_err(|err| ApiError::SessionError(err.to_string()))
    }

    pub async fn clear_session(session: &Session) -> Result<(), ApiError> {
        session
            .remove::<GuestCart>(CART_KEY)
            .await
            .map_err(|err| ApiError::SessionError(err.to_string()))?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add_item(
        &mut self,
        product_id: i32,
        quantity: u32,
        size: Option<String>,
        color: Option<String>,
    ) {
        if let Some(entry) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id && item.size == size && item.color == color)
        {
            entry.quantity = entry.quantity.saturating_add(quantity);
            return;
        }
        self.next_id += 1;
        self.items.push(GuestItem {
            id: self.next_id,
            product_id,
            quantity,
            size,
            color,
        });
    }

    //Quantity 0 removes the entry entirely.
    pub fn update_quantity(&mut self, id: i32, quantity: u32) -> Result<(), ApiError> {
        let position = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(ApiError::ItemNotFound(id))?;
        if quantity == 0 {
            self.items.remove(position);
        } else {
            self.items[position].quantity = quantity;
        }
        Ok(())
    }

    pub fn remove_item(&mut self, id: i32) -> Result<(), ApiError> {
        let position = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(ApiError::ItemNotFound(id))?;
        self.items.remove(position);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total_cost = 0.0;
        self.item_count = 0;
    }

    //Prices come from a fresh lookup on every mutation; products that
    //vanished from the catalog count as zero.
    pub fn recompute_total(&mut self, prices: &HashMap<i32, f64>) {
        self.total_cost = self
            .items
            .iter()
            .map(|item| item.quantity as f64 * prices.get(&item.product_id).copied().unwrap_or(0.0))
            .sum();
        self.item_count = self.items.iter().map(|item| item.quantity).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(pairs: &[(i32, f64)]) -> HashMap<i32, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn adding_same_variant_twice_sums_quantity() {
        let mut cart = GuestCart::default();
        cart.add_item(1, 2, Some("M".to_owned()), None);
        cart.add_item(1, 3, Some("M".to_owned()), None);

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
    }

    #[test]
    fn different_variant_gets_its_own_line_item() {
        let mut cart = GuestCart::default();
        cart.add_item(1, 1, Some("M".to_owned()), Some("red".to_owned()));
        cart.add_item(1, 1, Some("L".to_owned()), Some("red".to_owned()));
        cart.add_item(1, 1, Some("M".to_owned()), Some("blue".to_owned()));

        assert_eq!(cart.items.len(), 3);
    }

    #[test]
    fn total_is_quantity_times_current_price() {
        let mut cart = GuestCart::default();
        cart.add_item(1, 2, None, None);
        cart.add_item(2, 1, None, None);
        cart.recompute_total(&prices(&[(1, 10.0), (2, 5.5)]));

        assert_eq!(cart.total_cost, 25.5);
        assert_eq!(cart.item_count, 3);
    }

    #[test]
    fn missing_product_counts_as_zero_in_total() {
        let mut cart = GuestCart::default();
        cart.add_item(1, 2, None, None);
        cart.add_item(99, 4, None, None);
        cart.recompute_total(&prices(&[(1, 10.0)]));

        assert_eq!(cart.total_cost, 20.0);
        assert_eq!(cart.item_count, 6);
    }

    #[test]
    fn coalescing_saturates_instead_of_overflowing() {
        let mut cart = GuestCart::default();
        cart.add_item(1, u32::MAX, None, None);
        cart.add_item(1, 1, None, None);

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, u32::MAX);
    }

    #[test]
    fn zero_quantity_update_removes_item() {
        let mut cart = GuestCart::default();
        cart.add_item(1, 2, None, None);
        let id = cart.items[0].id;
        cart.update_quantity(id, 0).unwrap();

        assert!(cart.is_empty());
    }

    #[test]
    fn update_of_unknown_id_fails() {
        let mut cart = GuestCart::default();
        cart.add_item(1, 2, None, None);

        assert!(cart.update_quantity(42, 1).is_err());
    }

    #[test]
    fn remove_keeps_other_items() {
        let mut cart = GuestCart::default();
        cart.add_item(1, 1, None, None);
        cart.add_item(2, 1, None, None);
        let first = cart.items[0].id;
        cart.remove_item(first).unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id, 2);
    }

    #[test]
    fn clearing_empty_cart_is_fine() {
        let mut cart = GuestCart::default();
        cart.clear();

        assert!(cart.is_empty());
        assert_eq!(cart.total_cost, 0.0);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut cart = GuestCart::default();
        cart.add_item(1, 1, None, None);
        let first = cart.items[0].id;
        cart.remove_item(first).unwrap();
        cart.add_item(1, 1, None, None);

        assert_ne!(cart.items[0].id, first);
    }
}
