use crate::error::AppError;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("invalid customer id: {0}")]
    InvalidCustomer(i64),

    #[error("invalid restaurant id: {0}")]
    InvalidRestaurant(i64),

    #[error("order items cannot be empty")]
    EmptyItems,

    #[error("invalid item quantity: {0}")]
    InvalidQuantity(i64),

    #[error("menu item {0} is not available")]
    ItemNotAvailable(i64),

    #[error("quantity of menu item {0} is too large")]
    QuantityOverflow(i64),

    #[error("order total is too large")]
    PriceOverflow,
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        AppError::Invalid(err.to_string())
    }
}
