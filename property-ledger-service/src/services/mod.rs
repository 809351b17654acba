//! Core services: validation, write paths, idempotency and datastores.

pub mod budgets;
pub mod database;
pub mod dates;
pub mod entries;
pub mod error;
pub mod idempotency;
pub mod memory;
pub mod metrics;
pub mod store;
pub mod validation;

pub use budgets::BudgetService;
pub use database::Database;
pub use entries::{EntryWriter, WriteMode};
pub use error::LedgerError;
pub use idempotency::IdempotencyCache;
pub use metrics::{get_metrics, init_metrics};
pub use memory::MemoryStore;
pub use store::{LedgerStore, StoreTx};
pub use validation::RawEntry;
