use rust_decimal::Decimal;
use std::collections::HashMap;

use super::value_objects::MenuItem;

/// Availability-only view of a snapshot: menu item id -> orderable.
pub type AvailabilityMap = HashMap<i64, bool>;

/// Point-in-time price and availability view of one restaurant's menu.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuSnapshot {
    restaurant_id: i64,
    items: HashMap<i64, MenuItem>,
}

impl MenuSnapshot {
    pub fn new(restaurant_id: i64, items: impl IntoIterator<Item = MenuItem>) -> Self {
        Self {
            restaurant_id,
            items: items.into_iter().map(|item| (item.id, item)).collect(),
        }
    }

    pub fn restaurant_id(&self) -> i64 {
        self.restaurant_id
    }

    pub fn get(&self, menu_item_id: i64) -> Option<&MenuItem> {
        self.items.get(&menu_item_id)
    }

    pub fn is_available(&self, menu_item_id: i64) -> bool {
        self.get(menu_item_id).is_some_and(MenuItem::is_available)
    }

    /// Unit price of an item that is present and orderable right now.
    pub fn orderable_price(&self, menu_item_id: i64) -> Option<Decimal> {
        self.get(menu_item_id)
            .filter(|item| item.is_available())
            .map(|item| item.price)
    }

    pub fn availability(&self) -> AvailabilityMap {
        self.items
            .iter()
            .map(|(id, item)| (*id, item.is_available()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
