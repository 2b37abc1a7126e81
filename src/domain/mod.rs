// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// This module contains domain-specific aggregates and business logic.
// Each aggregate has its own subdirectory with:
// - Value objects
// - Errors
// - Aggregate implementation
//
// This layer knows nothing about persistence or transports; the services
// layer feeds it snapshots and stores what it produces.
//
// ============================================================================

pub mod actor;
pub mod menu;
pub mod order;
pub mod invoice;

pub use actor::{Actor, Role};
