//! Database layer for the dispatch backend.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. Every table the backend touches
//! (`agent_configs`, `calls`, `call_results`, `webhook_deliveries`) is
//! created through versioned migrations managed by this crate.
//!
//! Foreign keys are switched on for every pooled connection, so the schema
//! itself refuses orphaned calls and results.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_memory_pool, create_pool, DbPool, DbRuntimeSettings, PoolError};
