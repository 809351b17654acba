//! Property Ledger Service - financial ledger for a portfolio of properties.
//!
//! Properties, categories, entries and per-property budgets over HTTP, with a
//! validated batch import path and an idempotent single-entry write path.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::{build_router, AppState, Application};
