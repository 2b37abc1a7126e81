// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific rules:
// - Value objects (OrderItem)
// - Errors (OrderError enum)
// - Aggregate (Order with validation, item arithmetic and pricing)
//
// Persistence and authorization live in the services layer.
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
