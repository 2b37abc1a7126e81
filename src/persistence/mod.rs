// ============================================================================
// Persistence - repository adapters
// ============================================================================
//
// - InMemoryStore: lock-guarded tables, used by tests and the demo binary
// - PostgresStore: sqlx-backed store, used when DATABASE_URL is set
//
// ============================================================================

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
