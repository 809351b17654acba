//! HTTP handlers for property-ledger-service.

pub mod budgets;
pub mod categories;
pub mod dashboard;
pub mod entries;
pub mod health;
pub mod programmatic;
pub mod properties;
pub mod search;
