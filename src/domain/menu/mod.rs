// ============================================================================
// Menu Domain - restaurants, their menu items and availability snapshots
// ============================================================================
//
// Menu items are owned by restaurant owners and read by the ordering side.
// A `MenuSnapshot` is the point-in-time view the order and invoice rules
// are evaluated against; it is rebuilt for every request, never cached.
//
// ============================================================================

pub mod value_objects;
pub mod snapshot;

pub use value_objects::*;
pub use snapshot::*;
