//! Per-property budgets: update-then-insert writes and the merged read view.

use crate::models::{BudgetItem, BudgetRow};
use crate::services::entries::WriteMode;
use crate::services::error::LedgerError;
use crate::services::store::{LedgerStore, StoreTx};
use crate::services::validation::{parse_decimal, parse_id};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Parse one budget item from the wire. `id_grupo` is required; `orcamento`
/// defaults to zero.
pub fn parse_budget_item(value: &Value) -> Result<BudgetItem, LedgerError> {
    let object = value
        .as_object()
        .ok_or_else(|| LedgerError::InvalidPayload("budget item must be an object".to_string()))?;

    let group_id = match object.get("id_grupo") {
        None | Some(Value::Null) => return Err(LedgerError::MissingField(vec!["id_grupo"])),
        Some(v) => parse_id(v).ok_or(LedgerError::InvalidNumeric {
            field: "id_grupo",
            expected: "an integer",
        })?,
    };

    let amount = match object.get("orcamento") {
        None | Some(Value::Null) => Decimal::ZERO,
        Some(v) => parse_decimal(v).ok_or(LedgerError::InvalidNumeric {
            field: "orcamento",
            expected: "a number",
        })?,
    };

    Ok(BudgetItem { group_id, amount })
}

#[derive(Clone)]
pub struct BudgetService {
    store: Arc<dyn LedgerStore>,
    mode: WriteMode,
}

async fn upsert_one(
    tx: &mut dyn StoreTx,
    property_id: i64,
    item: &BudgetItem,
) -> Result<(), LedgerError> {
    let updated = tx
        .update_budget(property_id, item.group_id, item.amount)
        .await?;
    if updated == 0 {
        tx.insert_budget(property_id, item.group_id, item.amount)
            .await?;
    }
    Ok(())
}

impl BudgetService {
    pub fn new(store: Arc<dyn LedgerStore>, mode: WriteMode) -> Self {
        Self { store, mode }
    }

    /// Set the budget of each listed group, creating rows that do not exist.
    /// Items apply in order, so a later item overrides an earlier one for the
    /// same group.
    #[instrument(skip(self, items), fields(count = items.len(), mode = self.mode.as_str()))]
    pub async fn upsert_budgets(
        &self,
        property_id: i64,
        items: &[BudgetItem],
    ) -> Result<(), LedgerError> {
        match self.mode {
            WriteMode::Atomic => {
                let mut tx = self.store.begin().await?;
                for item in items {
                    upsert_one(tx.as_mut(), property_id, item).await?;
                }
                tx.commit().await?;
            }
            WriteMode::Partial => {
                for item in items {
                    let mut tx = self.store.begin().await?;
                    upsert_one(tx.as_mut(), property_id, item).await?;
                    tx.commit().await?;
                }
            }
        }

        info!(property_id, "Budgets updated");
        Ok(())
    }

    /// One row per known group, ordered by group id. Groups never budgeted
    /// for this property list with zero.
    #[instrument(skip(self))]
    pub async fn list_budgets(&self, property_id: i64) -> Result<Vec<BudgetRow>, LedgerError> {
        let groups = self.store.list_groups().await?;
        let amounts: HashMap<i64, Decimal> = self
            .store
            .list_budgets(property_id)
            .await?
            .into_iter()
            .map(|b| (b.group_id, b.amount))
            .collect();

        let mut rows: Vec<BudgetRow> = groups
            .into_iter()
            .map(|group| BudgetRow {
                property_id,
                group_id: group.id,
                amount: amounts.get(&group.id).copied().unwrap_or(Decimal::ZERO),
                label: group.label,
            })
            .collect();
        rows.sort_by_key(|row| row.group_id);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryStore;
    use rust_decimal_macros::dec;
    use serde_json::json;

    async fn setup(mode: WriteMode) -> (MemoryStore, BudgetService, i64, Vec<i64>) {
        let store = MemoryStore::new();
        let pid = store.create_property("Sítio", false).await.unwrap();
        let mut groups = Vec::new();
        for label in ["Aquisição", "Reforma", "Impostos"] {
            groups.push(store.insert_group(label).await);
        }
        let service = BudgetService::new(Arc::new(store.clone()), mode);
        (store, service, pid, groups)
    }

    #[tokio::test]
    async fn test_upsert_then_list_merges_zero_rows() {
        let (_, service, pid, groups) = setup(WriteMode::Partial).await;

        service
            .upsert_budgets(pid, &[BudgetItem { group_id: groups[2], amount: dec!(500) }])
            .await
            .unwrap();

        let rows = service.list_budgets(pid).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows.iter().map(|r| r.group_id).collect::<Vec<_>>(),
            groups
        );
        assert_eq!(rows[2].amount, dec!(500));
        assert_eq!(rows[2].label, "Impostos");
        assert_eq!(rows[0].amount, Decimal::ZERO);
        assert!(rows.iter().all(|r| r.property_id == pid));
    }

    #[tokio::test]
    async fn test_second_upsert_updates_existing_row() {
        let (store, service, pid, groups) = setup(WriteMode::Partial).await;
        let group = groups[0];

        service
            .upsert_budgets(pid, &[BudgetItem { group_id: group, amount: dec!(100) }])
            .await
            .unwrap();
        service
            .upsert_budgets(pid, &[BudgetItem { group_id: group, amount: dec!(250) }])
            .await
            .unwrap();

        let stored = store.list_budgets(pid).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].amount, dec!(250));
    }

    #[tokio::test]
    async fn test_same_group_twice_in_one_call_keeps_last() {
        let (store, service, pid, groups) = setup(WriteMode::Atomic).await;
        let group = groups[1];

        service
            .upsert_budgets(
                pid,
                &[
                    BudgetItem { group_id: group, amount: dec!(1) },
                    BudgetItem { group_id: group, amount: dec!(2) },
                ],
            )
            .await
            .unwrap();

        let stored = store.list_budgets(pid).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].amount, dec!(2));
    }

    #[tokio::test]
    async fn test_unknown_group_partial_vs_atomic() {
        let (store, service, pid, groups) = setup(WriteMode::Partial).await;
        let items = [
            BudgetItem { group_id: groups[0], amount: dec!(10) },
            BudgetItem { group_id: 999, amount: dec!(20) },
        ];
        assert!(matches!(
            service.upsert_budgets(pid, &items).await,
            Err(LedgerError::Datastore(_))
        ));
        assert_eq!(store.list_budgets(pid).await.unwrap().len(), 1);

        let (store, service, pid, groups) = setup(WriteMode::Atomic).await;
        let items = [
            BudgetItem { group_id: groups[0], amount: dec!(10) },
            BudgetItem { group_id: 999, amount: dec!(20) },
        ];
        assert!(service.upsert_budgets(pid, &items).await.is_err());
        assert!(store.list_budgets(pid).await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_budget_item() {
        let item = parse_budget_item(&json!({"id_grupo": "3", "orcamento": 500})).unwrap();
        assert_eq!(item, BudgetItem { group_id: 3, amount: dec!(500) });

        let item = parse_budget_item(&json!({"id_grupo": 4})).unwrap();
        assert_eq!(item.amount, Decimal::ZERO);

        assert!(matches!(
            parse_budget_item(&json!({"orcamento": 1})),
            Err(LedgerError::MissingField(_))
        ));
        assert!(matches!(
            parse_budget_item(&json!({"id_grupo": "x"})),
            Err(LedgerError::InvalidNumeric { field: "id_grupo", .. })
        ));
        assert!(matches!(
            parse_budget_item(&json!(3)),
            Err(LedgerError::InvalidPayload(_))
        ));
    }
}
