use super::value_objects::PaymentStatus;
use crate::error::AppError;

// ============================================================================
// Invoice Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvoiceError {
    #[error("cannot move invoice from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("unknown payment status: {0}")]
    UnknownStatus(String),
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        AppError::Invalid(err.to_string())
    }
}
