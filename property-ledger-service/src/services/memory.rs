//! In-process [`LedgerStore`] for tests and local development.
//!
//! Enforces the same foreign keys and primary keys as the PostgreSQL schema so
//! that write paths behave alike on both backends. Transactions are
//! serialized: a [`MemoryTx`] holds the state lock until it is committed or
//! dropped, and dropping it uncommitted restores the state it started from.

use crate::models::{
    Budget, Category, CategoryMatch, ConfirmedEntry, Entry, Group, NewEntry, Property,
    PropertyMatch, PropertySummary, Reference, CONFIRMED_SITUATION_ID,
    UNCATEGORIZED_CATEGORY_ID,
};
use crate::services::error::LedgerError;
use crate::services::store::{LedgerStore, StoreTx};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_property_id: i64,
    last_category_id: i64,
    last_entry_id: i64,
    last_group_id: i64,
    properties: BTreeMap<i64, Property>,
    categories: BTreeMap<i64, Category>,
    situations: BTreeMap<i64, String>,
    groups: BTreeMap<i64, Group>,
    entries: BTreeMap<i64, Entry>,
    budgets: BTreeMap<(i64, i64), Decimal>,
}

/// Case-insensitive substring test, the in-memory counterpart of `ILIKE '%term%'`.
fn matches(haystack: &str, term: Option<&str>) -> bool {
    term.map_or(true, |term| {
        haystack.to_lowercase().contains(&term.to_lowercase())
    })
}

/// Applies `OFFSET`/`LIMIT` to an already ordered row set.
fn page<T>(rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let skip = usize::try_from(offset).unwrap_or(0);
    let take = usize::try_from(limit).unwrap_or(0);
    rows.into_iter().skip(skip).take(take).collect()
}

fn fk_violation(table: &str, field: &str, id: i64) -> LedgerError {
    LedgerError::Datastore(anyhow::anyhow!(
        "insert or update on table \"{}\" violates foreign key constraint: {} = {} is not present",
        table,
        field,
        id
    ))
}

impl MemoryState {
    fn seeded() -> Self {
        let mut state = Self::default();
        state.situations.insert(CONFIRMED_SITUATION_ID, "Confirmado".to_string());
        state.situations.insert(2, "Em contratação".to_string());
        state.categories.insert(
            UNCATEGORIZED_CATEGORY_ID,
            Category {
                id: UNCATEGORIZED_CATEGORY_ID,
                label: "Sem categoria".to_string(),
                dc: "D".to_string(),
                created_at: Utc::now(),
            },
        );
        state
    }

    fn exists(&self, reference: Reference, id: i64) -> bool {
        match reference {
            Reference::Property => self.properties.contains_key(&id),
            Reference::Category => self.categories.contains_key(&id),
            Reference::Situation => self.situations.contains_key(&id),
        }
    }

    fn check_entry_references(&self, entry: &NewEntry) -> Result<(), LedgerError> {
        for (reference, id) in [
            (Reference::Property, entry.property_id),
            (Reference::Category, entry.category_id),
            (Reference::Situation, entry.situation_id),
        ] {
            if !self.exists(reference, id) {
                return Err(fk_violation("lancamentos", reference.field(), id));
            }
        }
        Ok(())
    }

    fn build_entry(&self, id: i64, entry: &NewEntry) -> Result<Entry, LedgerError> {
        let date = entry.date.to_naive_date()?;
        self.check_entry_references(entry)?;
        Ok(Entry {
            id,
            date,
            property_id: entry.property_id,
            category_id: entry.category_id,
            situation_id: entry.situation_id,
            description: entry.description.clone(),
            amount: entry.amount,
            active: true,
        })
    }

    fn confirmed(&self, as_of: NaiveDate) -> impl Iterator<Item = &Entry> {
        self.entries
            .values()
            .filter(move |e| e.situation_id == CONFIRMED_SITUATION_ID && e.date <= as_of)
    }
}

/// Shared in-memory datastore. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store seeded with the situations and the uncategorized category.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::seeded())),
        }
    }

    /// Add a budget group. Groups have no HTTP surface; they are seeded.
    pub async fn insert_group(&self, label: &str) -> i64 {
        let mut state = self.state.lock().await;
        state.last_group_id += 1;
        let id = state.last_group_id;
        state.groups.insert(
            id,
            Group {
                id,
                label: label.to_string(),
            },
        );
        id
    }

    pub async fn insert_situation(&self, id: i64, label: &str) {
        self.state
            .lock()
            .await
            .situations
            .insert(id, label.to_string());
    }
}

/// Transaction over a [`MemoryStore`].
pub struct MemoryTx {
    state: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.state = snapshot;
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn exists(&mut self, reference: Reference, id: i64) -> Result<bool, LedgerError> {
        Ok(self.state.exists(reference, id))
    }

    async fn insert_entry(&mut self, entry: &NewEntry) -> Result<i64, LedgerError> {
        let id = self.state.last_entry_id + 1;
        let row = self.state.build_entry(id, entry)?;
        self.state.last_entry_id = id;
        self.state.entries.insert(id, row);
        Ok(id)
    }

    async fn update_entry(&mut self, id: i64, entry: &NewEntry) -> Result<u64, LedgerError> {
        if !self.state.entries.contains_key(&id) {
            return Ok(0);
        }
        let row = self.state.build_entry(id, entry)?;
        self.state.entries.insert(id, row);
        Ok(1)
    }

    async fn update_budget(
        &mut self,
        property_id: i64,
        group_id: i64,
        amount: Decimal,
    ) -> Result<u64, LedgerError> {
        match self.state.budgets.get_mut(&(property_id, group_id)) {
            Some(current) => {
                *current = amount;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn insert_budget(
        &mut self,
        property_id: i64,
        group_id: i64,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if !self.state.properties.contains_key(&property_id) {
            return Err(fk_violation("orcamentos", "id_imovel", property_id));
        }
        if !self.state.groups.contains_key(&group_id) {
            return Err(fk_violation("orcamentos", "id_grupo", group_id));
        }
        if self.state.budgets.contains_key(&(property_id, group_id)) {
            return Err(LedgerError::Datastore(anyhow::anyhow!(
                "duplicate key value violates unique constraint: (id_imovel, id_grupo)=({}, {})",
                property_id,
                group_id
            )));
        }
        self.state.budgets.insert((property_id, group_id), amount);
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), LedgerError> {
        self.snapshot = None;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, LedgerError> {
        let state = Arc::clone(&self.state).lock_owned().await;
        let snapshot = Some(state.clone());
        Ok(Box::new(MemoryTx { state, snapshot }))
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        Ok(())
    }

    async fn list_properties(&self) -> Result<Vec<PropertySummary>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<PropertySummary> = state
            .properties
            .values()
            .map(|p| PropertySummary {
                id: p.id,
                name: p.name.clone(),
                sold: p.sold,
                total_entries: state
                    .entries
                    .values()
                    .filter(|e| e.property_id == p.id)
                    .map(|e| e.amount)
                    .sum(),
            })
            .collect();
        // Newest first, like `ORDER BY created_at DESC`.
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(rows)
    }

    async fn get_property(&self, id: i64) -> Result<Option<Property>, LedgerError> {
        Ok(self.state.lock().await.properties.get(&id).cloned())
    }

    async fn create_property(&self, name: &str, sold: bool) -> Result<i64, LedgerError> {
        let mut state = self.state.lock().await;
        state.last_property_id += 1;
        let id = state.last_property_id;
        state.properties.insert(id, Property::new(id, name, sold));
        Ok(id)
    }

    async fn update_property(&self, property: &Property) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        match state.properties.get_mut(&property.id) {
            Some(current) => {
                let created_at = current.created_at;
                *current = Property {
                    created_at,
                    ..property.clone()
                };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_property(&self, id: i64) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        if !state.properties.contains_key(&id) {
            return Ok(false);
        }
        if state.entries.values().any(|e| e.property_id == id) {
            return Err(LedgerError::Datastore(anyhow::anyhow!(
                "update or delete on table \"imoveis\" violates foreign key constraint on table \"lancamentos\""
            )));
        }
        state.properties.remove(&id);
        state.budgets.retain(|(property_id, _), _| *property_id != id);
        Ok(true)
    }

    async fn search_properties(
        &self,
        term: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PropertyMatch>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<PropertyMatch> = state
            .properties
            .values()
            .filter(|p| matches(&p.name, term))
            .map(|p| PropertyMatch {
                id: p.id,
                name: p.name.clone(),
            })
            .collect();
        match term {
            Some(_) => rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
            None => rows.sort_by(|a, b| b.id.cmp(&a.id)),
        }
        Ok(page(rows, limit, offset))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Category> = state.categories.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn create_category(&self, label: &str, dc: &str) -> Result<i64, LedgerError> {
        let mut state = self.state.lock().await;
        state.last_category_id += 1;
        let id = state.last_category_id;
        state.categories.insert(
            id,
            Category {
                id,
                label: label.to_string(),
                dc: dc.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn delete_category(&self, id: i64) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        if !state.categories.contains_key(&id) {
            return Ok(false);
        }
        if state.entries.values().any(|e| e.category_id == id) {
            return Err(LedgerError::Datastore(anyhow::anyhow!(
                "update or delete on table \"categorias\" violates foreign key constraint on table \"lancamentos\""
            )));
        }
        state.categories.remove(&id);
        Ok(true)
    }

    async fn search_categories(
        &self,
        term: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CategoryMatch>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<CategoryMatch> = state
            .categories
            .values()
            .filter(|c| matches(&c.label, term))
            .map(|c| CategoryMatch {
                id: c.id,
                label: c.label.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
        Ok(page(rows, limit, offset))
    }

    async fn list_entries(&self) -> Result<Vec<Entry>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Entry> = state.entries.values().cloned().collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn count_entries(&self) -> Result<i64, LedgerError> {
        Ok(self.state.lock().await.entries.len() as i64)
    }

    async fn delete_entry(&self, id: i64) -> Result<bool, LedgerError> {
        Ok(self.state.lock().await.entries.remove(&id).is_some())
    }

    async fn last_confirmed_entries(
        &self,
        as_of: NaiveDate,
        limit: i64,
    ) -> Result<Vec<ConfirmedEntry>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<&Entry> = state
            .confirmed(as_of)
            .filter(|e| e.category_id != UNCATEGORIZED_CATEGORY_ID)
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(rows
            .into_iter()
            .filter_map(|e| {
                let property = state.properties.get(&e.property_id)?;
                let category = state.categories.get(&e.category_id)?;
                Some(ConfirmedEntry {
                    date: e.date,
                    description: e.description.clone(),
                    amount: e.amount,
                    property: property.name.clone(),
                    category: category.label.clone(),
                })
            })
            .take(limit)
            .collect())
    }

    async fn last_confirmed_date(&self, as_of: NaiveDate) -> Result<Option<NaiveDate>, LedgerError> {
        Ok(self.state.lock().await.confirmed(as_of).map(|e| e.date).max())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, LedgerError> {
        Ok(self.state.lock().await.groups.values().cloned().collect())
    }

    async fn list_budgets(&self, property_id: i64) -> Result<Vec<Budget>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .budgets
            .iter()
            .filter(|((pid, _), _)| *pid == property_id)
            .map(|(&(property_id, group_id), &amount)| Budget {
                property_id,
                group_id,
                amount,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dates;
    use rust_decimal_macros::dec;

    fn new_entry(property_id: i64, date: &str) -> NewEntry {
        NewEntry {
            date: dates::normalize(date).unwrap(),
            property_id,
            category_id: UNCATEGORIZED_CATEGORY_ID,
            situation_id: CONFIRMED_SITUATION_ID,
            description: "Condomínio".to_string(),
            amount: dec!(-800),
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let pid = store.create_property("Apto 101", false).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_entry(&new_entry(pid, "2024-03-01")).await.unwrap();
        }
        assert_eq!(store.count_entries().await.unwrap(), 0);

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert_entry(&new_entry(pid, "2024-03-01")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(store.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx.insert_entry(&new_entry(42, "2024-03-01")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Datastore(_)));

        let err = tx.insert_budget(42, 1, dec!(10)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Datastore(_)));
    }

    #[tokio::test]
    async fn test_impossible_calendar_date_is_rejected_on_write() {
        let store = MemoryStore::new();
        let pid = store.create_property("Apto 101", false).await.unwrap();
        let mut tx = store.begin().await.unwrap();

        let err = tx.insert_entry(&new_entry(pid, "31/02/2024")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Datastore(_)));
    }

    #[tokio::test]
    async fn test_duplicate_budget_insert_fails() {
        let store = MemoryStore::new();
        let pid = store.create_property("Apto 101", false).await.unwrap();
        let gid = store.insert_group("Reforma").await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_budget(pid, gid, dec!(100)).await.unwrap();
        assert!(tx.insert_budget(pid, gid, dec!(200)).await.is_err());
        assert_eq!(tx.update_budget(pid, gid, dec!(300)).await.unwrap(), 1);
        tx.commit().await.unwrap();

        let budgets = store.list_budgets(pid).await.unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].amount, dec!(300));
    }

    #[tokio::test]
    async fn test_delete_property_with_entries_fails() {
        let store = MemoryStore::new();
        let pid = store.create_property("Apto 101", false).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.insert_entry(&new_entry(pid, "2024-03-01")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.delete_property(pid).await.is_err());
        assert!(store.get_property(pid).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_property_cascades_budgets() {
        let store = MemoryStore::new();
        let pid = store.create_property("Apto 101", false).await.unwrap();
        let gid = store.insert_group("Reforma").await;
        let mut tx = store.begin().await.unwrap();
        tx.insert_budget(pid, gid, dec!(100)).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.delete_property(pid).await.unwrap());
        assert!(store.list_budgets(pid).await.unwrap().is_empty());
        assert!(!store.delete_property(pid).await.unwrap());
    }

    #[tokio::test]
    async fn test_property_summary_sums_entries() {
        let store = MemoryStore::new();
        let pid = store.create_property("Apto 101", false).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.insert_entry(&new_entry(pid, "2024-03-01")).await.unwrap();
        tx.insert_entry(&new_entry(pid, "2024-04-01")).await.unwrap();
        tx.commit().await.unwrap();

        let rows = store.list_properties().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_entries, dec!(-1600));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_paged() {
        let store = MemoryStore::new();
        for name in ["Casa Verde", "Apto Centro", "casa azul", "Sítio"] {
            store.create_property(name, false).await.unwrap();
        }

        let hits = store.search_properties(Some("CASA"), 10, 0).await.unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Casa Verde", "casa azul"]);

        let second = store.search_properties(Some("casa"), 1, 1).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "casa azul");

        let newest = store.search_properties(None, 1, 0).await.unwrap();
        assert_eq!(newest[0].name, "Sítio");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let store = MemoryStore::new();
        store.create_category("Taxa 100%", "D").await.unwrap();
        store.create_category("Taxa fixa", "D").await.unwrap();

        let hits = store.search_categories(Some("%"), 10, 0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "Taxa 100%");
    }
}
