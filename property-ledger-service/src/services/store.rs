//! Datastore seam.
//!
//! The write pipeline only needs a small transactional surface: existence
//! lookups, inserts that return the generated id, and updates that report the
//! affected row count. Reads used by the CRUD routes and dashboard views go
//! straight through [`LedgerStore`].

use crate::models::{
    Budget, Category, CategoryMatch, ConfirmedEntry, Entry, Group, NewEntry, Property,
    PropertyMatch, PropertySummary, Reference,
};
use crate::services::error::LedgerError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// One unit of work. Dropping it without [`StoreTx::commit`] rolls back.
#[async_trait]
pub trait StoreTx: Send {
    /// Whether a row with `id` exists for the referenced entity.
    async fn exists(&mut self, reference: Reference, id: i64) -> Result<bool, LedgerError>;

    /// Insert an active entry and return its generated id.
    async fn insert_entry(&mut self, entry: &NewEntry) -> Result<i64, LedgerError>;

    /// Overwrite every editable column of an entry. Returns affected rows.
    async fn update_entry(&mut self, id: i64, entry: &NewEntry) -> Result<u64, LedgerError>;

    /// Set the budget of (property, group). Returns affected rows.
    async fn update_budget(
        &mut self,
        property_id: i64,
        group_id: i64,
        amount: Decimal,
    ) -> Result<u64, LedgerError>;

    async fn insert_budget(
        &mut self,
        property_id: i64,
        group_id: i64,
        amount: Decimal,
    ) -> Result<(), LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;

    // Properties
    async fn list_properties(&self) -> Result<Vec<PropertySummary>, LedgerError>;
    async fn get_property(&self, id: i64) -> Result<Option<Property>, LedgerError>;
    async fn create_property(&self, name: &str, sold: bool) -> Result<i64, LedgerError>;
    async fn update_property(&self, property: &Property) -> Result<bool, LedgerError>;
    async fn delete_property(&self, id: i64) -> Result<bool, LedgerError>;

    /// Case-insensitive substring match on the name, ordered by name. Without
    /// a term, the most recently created properties come first.
    async fn search_properties(
        &self,
        term: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PropertyMatch>, LedgerError>;

    // Categories
    async fn list_categories(&self) -> Result<Vec<Category>, LedgerError>;
    async fn create_category(&self, label: &str, dc: &str) -> Result<i64, LedgerError>;
    async fn delete_category(&self, id: i64) -> Result<bool, LedgerError>;

    /// Case-insensitive substring match on the label, ordered by label.
    async fn search_categories(
        &self,
        term: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CategoryMatch>, LedgerError>;

    // Entries
    async fn list_entries(&self) -> Result<Vec<Entry>, LedgerError>;
    async fn count_entries(&self) -> Result<i64, LedgerError>;
    async fn delete_entry(&self, id: i64) -> Result<bool, LedgerError>;

    /// Confirmed entries dated on or before `as_of`, excluding uncategorized
    /// ones, newest first (ties broken by id, newest first).
    async fn last_confirmed_entries(
        &self,
        as_of: NaiveDate,
        limit: i64,
    ) -> Result<Vec<ConfirmedEntry>, LedgerError>;

    /// Latest confirmed entry date on or before `as_of`.
    async fn last_confirmed_date(&self, as_of: NaiveDate) -> Result<Option<NaiveDate>, LedgerError>;

    // Budgets
    async fn list_groups(&self) -> Result<Vec<Group>, LedgerError>;
    async fn list_budgets(&self, property_id: i64) -> Result<Vec<Budget>, LedgerError>;
}
