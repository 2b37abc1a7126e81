use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::menu::{AvailabilityMap, MenuSnapshot};
use super::errors::OrderError;
use super::value_objects::OrderItem;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// An order belongs to exactly one customer and one restaurant. Its lines are
// kept in insertion order. A draft may repeat a menu item across lines until
// `merge_duplicate_lines` folds them; stored orders hold one line per item.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity (0 until persisted)
    pub id: i64,

    pub customer_id: i64,
    pub restaurant_id: i64,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn new(customer_id: i64, restaurant_id: i64) -> Result<Self, OrderError> {
        if customer_id <= 0 {
            return Err(OrderError::InvalidCustomer(customer_id));
        }
        if restaurant_id <= 0 {
            return Err(OrderError::InvalidRestaurant(restaurant_id));
        }

        Ok(Self {
            id: 0,
            customer_id,
            restaurant_id,
            items: Vec::new(),
        })
    }

    /// Request-shaped order; nothing is checked until [`Order::check`] runs.
    pub fn draft(customer_id: i64, restaurant_id: i64, items: Vec<OrderItem>) -> Self {
        Self {
            id: 0,
            customer_id,
            restaurant_id,
            items,
        }
    }

    /// Explain why the order is not acceptable against `availability`.
    pub fn check(&self, availability: &AvailabilityMap) -> Result<(), OrderError> {
        if self.customer_id <= 0 {
            return Err(OrderError::InvalidCustomer(self.customer_id));
        }
        if self.restaurant_id <= 0 {
            return Err(OrderError::InvalidRestaurant(self.restaurant_id));
        }
        if self.items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        for item in &self.items {
            if item.quantity <= 0 {
                return Err(OrderError::InvalidQuantity(item.quantity));
            }
            if !availability.get(&item.menu_item_id).copied().unwrap_or(false) {
                return Err(OrderError::ItemNotAvailable(item.menu_item_id));
            }
        }

        Ok(())
    }

    pub fn validate(&self, availability: &AvailabilityMap) -> bool {
        self.check(availability).is_ok()
    }

    /// Merge `quantity` into the line for `menu_item_id`, appending a new line
    /// at the end if there is none. Non-positive quantities are ignored.
    pub fn add_item(&mut self, menu_item_id: i64, quantity: i64) -> Result<(), OrderError> {
        if quantity <= 0 {
            return Ok(());
        }

        match self.items.iter_mut().find(|line| line.menu_item_id == menu_item_id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(OrderError::QuantityOverflow(menu_item_id))?;
            }
            None => self.items.push(OrderItem::new(menu_item_id, quantity)),
        }
        Ok(())
    }

    /// Fold lines that repeat a menu item into the first line for that item.
    /// Meant for checked orders: lines with a non-positive quantity are dropped.
    pub fn merge_duplicate_lines(&mut self) -> Result<(), OrderError> {
        for line in std::mem::take(&mut self.items) {
            self.add_item(line.menu_item_id, line.quantity)?;
        }
        Ok(())
    }

    /// Take `quantity` off the line for `menu_item_id`; the line disappears
    /// once nothing is left on it.
    pub fn remove_item(&mut self, menu_item_id: i64, quantity: i64) {
        if quantity <= 0 {
            return;
        }

        let Some(index) = self
            .items
            .iter()
            .position(|line| line.menu_item_id == menu_item_id)
        else {
            return;
        };

        if self.items[index].quantity <= quantity {
            self.items.remove(index);
        } else {
            self.items[index].quantity -= quantity;
        }
    }

    pub fn clear_items(&mut self) {
        self.items.clear();
    }

    /// Sum of `price * quantity` over lines that are orderable in `menu`.
    /// Stale lines contribute nothing.
    pub fn total_price(&self, menu: &MenuSnapshot) -> Result<Decimal, OrderError> {
        self.items
            .iter()
            .filter_map(|line| {
                menu.orderable_price(line.menu_item_id)
                    .map(|price| price.checked_mul(Decimal::from(line.quantity)))
            })
            .try_fold(Decimal::ZERO, |total, amount| {
                amount.and_then(|amount| total.checked_add(amount))
            })
            .ok_or(OrderError::PriceOverflow)
    }

    pub fn is_owned_by(&self, customer_id: i64) -> bool {
        self.customer_id == customer_id
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
