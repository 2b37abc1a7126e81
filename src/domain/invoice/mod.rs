// ============================================================================
// Invoice Domain - priced bills derived from orders
// ============================================================================
//
// - Value objects (PaymentStatus)
// - Errors (InvoiceError enum)
// - Aggregate (Invoice with tax policy and the payment state machine)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;

pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
