use serde::{Deserialize, Serialize};

// ============================================================================
// Order Value Objects
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderItem {
    pub menu_item_id: i64,
    pub quantity: i64,
}

impl OrderItem {
    pub fn new(menu_item_id: i64, quantity: i64) -> Self {
        Self {
            menu_item_id,
            quantity,
        }
    }

    /// Shape check only; availability is decided against a menu snapshot.
    pub fn validate(&self) -> bool {
        self.menu_item_id > 0 && self.quantity > 0
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_item_creation() {
        let item = OrderItem::new(3, 5);

        assert_eq!(item.menu_item_id, 3);
        assert_eq!(item.quantity, 5);
        assert!(item.validate());
    }

    #[test]
    fn test_order_item_shape_check() {
        assert!(!OrderItem::new(0, 1).validate());
        assert!(!OrderItem::new(-4, 1).validate());
        assert!(!OrderItem::new(1, 0).validate());
        assert!(!OrderItem::new(1, -2).validate());
    }

    #[test]
    fn test_order_item_serialization() {
        let item = OrderItem::new(12, 3);

        let json = serde_json::to_string(&item).unwrap();
        let deserialized: OrderItem = serde_json::from_str(&json).unwrap();

        assert_eq!(item, deserialized);
        assert!(json.contains("menu_item_id"));
    }
}
