use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Menu Value Objects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub available: bool,
    pub restaurant_id: i64,
}

impl MenuItem {
    pub fn new(name: impl Into<String>, price: Decimal, available: bool, restaurant_id: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            price,
            available,
            restaurant_id,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn validate(&self) -> bool {
        !self.name.is_empty() && self.price >= Decimal::ZERO && self.restaurant_id > 0
    }

    pub fn is_available(&self) -> bool {
        self.available
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
}

impl Restaurant {
    pub fn new(name: impl Into<String>, owner_id: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            owner_id,
        }
    }

    pub fn validate(&self) -> bool {
        !self.name.is_empty() && self.owner_id > 0
    }
}
