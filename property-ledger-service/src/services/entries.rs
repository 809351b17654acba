//! Entry write paths: dashboard batch import, programmatic single write and
//! manual edit.

use crate::models::CreatedEntry;
use crate::services::error::LedgerError;
use crate::services::idempotency::IdempotencyCache;
use crate::services::metrics::{ENTRIES_WRITTEN, ERRORS_TOTAL, IDEMPOTENCY_CONFLICTS};
use crate::services::store::LedgerStore;
use crate::services::validation::{validate_entry, RawEntry, ValidationPolicy};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// How a multi-item write treats a failure partway through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Each item commits on its own; items before a failure stay written.
    #[default]
    Partial,
    /// All items share one transaction; any failure writes nothing.
    Atomic,
}

impl WriteMode {
    pub fn from_atomic_flag(atomic: bool) -> Self {
        if atomic {
            WriteMode::Atomic
        } else {
            WriteMode::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Partial => "partial",
            WriteMode::Atomic => "atomic",
        }
    }
}

fn record_failure(path: &'static str, err: &LedgerError) {
    ERRORS_TOTAL.with_label_values(&[err.kind()]).inc();
    ENTRIES_WRITTEN.with_label_values(&[path, "error"]).inc();
    if err.is_validation() {
        warn!(path, error = %err, "Entry rejected");
    } else {
        error!(path, error = %err, "Entry write failed");
    }
}

#[derive(Clone)]
pub struct EntryWriter {
    store: Arc<dyn LedgerStore>,
    idempotency: Arc<IdempotencyCache>,
    mode: WriteMode,
    check_references: bool,
}

impl EntryWriter {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        idempotency: Arc<IdempotencyCache>,
        mode: WriteMode,
        check_references: bool,
    ) -> Self {
        Self {
            store,
            idempotency,
            mode,
            check_references,
        }
    }

    /// Decode, validate and insert `entries` in order. Returns the number submitted.
    ///
    /// Each item is decoded inside the write loop, so in partial mode a
    /// malformed item keeps the entries before it like any other failure.
    #[instrument(skip(self, entries), fields(count = entries.len(), mode = self.mode.as_str()))]
    pub async fn write_batch(&self, entries: &[Value]) -> Result<usize, LedgerError> {
        let policy = ValidationPolicy::batch(self.check_references);

        let result = match self.mode {
            WriteMode::Atomic => self.write_batch_atomic(entries, policy).await,
            WriteMode::Partial => self.write_batch_partial(entries, policy).await,
        };

        match result {
            Ok(()) => {
                info!(total = entries.len(), "Batch written");
                Ok(entries.len())
            }
            Err((index, err)) => {
                warn!(index, "Batch stopped at entry");
                record_failure("batch", &err);
                Err(err)
            }
        }
    }

    async fn write_batch_atomic(
        &self,
        entries: &[Value],
        policy: ValidationPolicy,
    ) -> Result<(), (usize, LedgerError)> {
        let mut tx = self.store.begin().await.map_err(|e| (0, e))?;
        for (index, item) in entries.iter().enumerate() {
            let raw = RawEntry::from_json(item).map_err(|e| (index, e))?;
            let entry = validate_entry(&raw, policy, tx.as_mut())
                .await
                .map_err(|e| (index, e))?;
            tx.insert_entry(&entry).await.map_err(|e| (index, e))?;
        }
        tx.commit().await.map_err(|e| (entries.len(), e))?;

        ENTRIES_WRITTEN
            .with_label_values(&["batch", "ok"])
            .inc_by(entries.len() as f64);
        Ok(())
    }

    async fn write_batch_partial(
        &self,
        entries: &[Value],
        policy: ValidationPolicy,
    ) -> Result<(), (usize, LedgerError)> {
        for (index, item) in entries.iter().enumerate() {
            let raw = RawEntry::from_json(item).map_err(|e| (index, e))?;
            let mut tx = self.store.begin().await.map_err(|e| (index, e))?;
            let entry = validate_entry(&raw, policy, tx.as_mut())
                .await
                .map_err(|e| (index, e))?;
            tx.insert_entry(&entry).await.map_err(|e| (index, e))?;
            tx.commit().await.map_err(|e| (index, e))?;
            ENTRIES_WRITTEN.with_label_values(&["batch", "ok"]).inc();
        }
        Ok(())
    }

    /// Write one entry at most once per idempotency key.
    ///
    /// The key is held while the request is processed and kept only if the
    /// entry was written; a failed request leaves it free for a retry.
    #[instrument(skip(self, raw))]
    pub async fn write_single(
        &self,
        idempotency_key: Option<&str>,
        raw: &RawEntry,
    ) -> Result<CreatedEntry, LedgerError> {
        let key = idempotency_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(LedgerError::MissingIdempotencyKey)?;

        let reservation = self.idempotency.reserve(key).inspect_err(|_| {
            IDEMPOTENCY_CONFLICTS
                .with_label_values(&["/gpt/lancamentos"])
                .inc();
        })?;

        match self.insert_validated(raw).await {
            Ok(created) => {
                reservation.commit();
                ENTRIES_WRITTEN
                    .with_label_values(&["programmatic", "ok"])
                    .inc();
                info!(entry_id = created.id, idempotency_key = %key, "Entry created");
                Ok(created)
            }
            Err(err) => {
                record_failure("programmatic", &err);
                Err(err)
            }
        }
    }

    async fn insert_validated(&self, raw: &RawEntry) -> Result<CreatedEntry, LedgerError> {
        let mut tx = self.store.begin().await?;
        let entry = validate_entry(raw, ValidationPolicy::programmatic(), tx.as_mut()).await?;
        let id = tx.insert_entry(&entry).await?;
        tx.commit().await?;

        Ok(CreatedEntry {
            id,
            description: entry.description,
            amount: entry.amount,
        })
    }

    /// Replace every editable column of entry `id`.
    #[instrument(skip(self, raw))]
    pub async fn update_entry(&self, id: i64, raw: &RawEntry) -> Result<(), LedgerError> {
        let policy = ValidationPolicy::manual_edit(self.check_references);

        let result: Result<(), LedgerError> = async {
            let mut tx = self.store.begin().await?;
            let entry = validate_entry(raw, policy, tx.as_mut()).await?;
            if tx.update_entry(id, &entry).await? == 0 {
                return Err(LedgerError::NotFound(format!("Entry {}", id)));
            }
            tx.commit().await
        }
        .await;

        match result {
            Ok(()) => {
                ENTRIES_WRITTEN.with_label_values(&["manual", "ok"]).inc();
                info!(entry_id = id, "Entry updated");
                Ok(())
            }
            Err(err) => {
                record_failure("manual", &err);
                Err(err)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_entry(&self, id: i64) -> Result<(), LedgerError> {
        if !self.store.delete_entry(id).await? {
            return Err(LedgerError::NotFound(format!("Entry {}", id)));
        }
        info!(entry_id = id, "Entry deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reference;
    use crate::services::memory::MemoryStore;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn raw(value: Value) -> RawEntry {
        serde_json::from_value(value).unwrap()
    }

    async fn setup(mode: WriteMode, check_references: bool) -> (MemoryStore, EntryWriter, i64) {
        let store = MemoryStore::new();
        let pid = store.create_property("Casa Praia", false).await.unwrap();
        let writer = EntryWriter::new(
            Arc::new(store.clone()),
            Arc::new(IdempotencyCache::default()),
            mode,
            check_references,
        );
        (store, writer, pid)
    }

    fn valid(pid: i64) -> Value {
        json!({"data": "05/12/2024", "id_imovel": pid, "descricao": "IPTU", "valor": -120.5})
    }

    fn programmatic(pid: i64, category: i64) -> RawEntry {
        raw(json!({
            "data": "2024-12-05",
            "id_imovel": pid,
            "id_categoria": category,
            "id_situacao": 1,
            "descricao": "Aluguel dezembro",
            "valor": 2500
        }))
    }

    #[tokio::test]
    async fn test_partial_batch_keeps_entries_before_failure() {
        let (store, writer, pid) = setup(WriteMode::Partial, false).await;
        let bad = json!({"data": "bad-date", "id_imovel": pid, "descricao": "x", "valor": 1});

        let err = writer.write_batch(&[valid(pid), bad]).await.unwrap_err();

        assert!(matches!(err, LedgerError::InvalidDateFormat(_)));
        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date.to_string(), "2024-12-05");
        assert_eq!(entries[0].category_id, 0);
        assert_eq!(entries[0].situation_id, 1);
    }

    #[tokio::test]
    async fn test_atomic_batch_writes_nothing_on_failure() {
        let (store, writer, pid) = setup(WriteMode::Atomic, false).await;
        let bad = json!({"data": "bad-date", "id_imovel": pid, "descricao": "x", "valor": 1});

        let err = writer.write_batch(&[valid(pid), bad]).await.unwrap_err();

        assert!(matches!(err, LedgerError::InvalidDateFormat(_)));
        assert_eq!(store.count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_batch_keeps_entries_before_non_object_item() {
        let (store, writer, pid) = setup(WriteMode::Partial, false).await;

        let err = writer
            .write_batch(&[valid(pid), json!(42), valid(pid)])
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidPayload(_)));
        assert_eq!(store.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_atomic_batch_rejects_non_object_item() {
        let (store, writer, pid) = setup(WriteMode::Atomic, false).await;

        let err = writer
            .write_batch(&[valid(pid), json!("x")])
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidPayload(_)));
        assert_eq!(store.count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_returns_submitted_count() {
        let (store, writer, pid) = setup(WriteMode::Atomic, false).await;
        let total = writer.write_batch(&[valid(pid), valid(pid)]).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(store.count_entries().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_batch_bad_reference_depends_on_policy() {
        let (_, unchecked, pid) = setup(WriteMode::Partial, false).await;
        let err = unchecked.write_batch(&[valid(pid + 99)]).await.unwrap_err();
        assert!(matches!(err, LedgerError::Datastore(_)));

        let (_, checked, pid) = setup(WriteMode::Partial, true).await;
        let err = checked.write_batch(&[valid(pid + 99)]).await.unwrap_err();
        assert!(matches!(err, LedgerError::ReferenceNotFound(Reference::Property)));
    }

    #[tokio::test]
    async fn test_repeated_key_is_rejected() {
        let (store, writer, pid) = setup(WriteMode::Partial, false).await;

        let created = writer
            .write_single(Some("abc-123"), &programmatic(pid, 0))
            .await
            .unwrap();
        assert_eq!(created.description, "Aluguel dezembro");
        assert_eq!(created.amount, dec!(2500));

        let err = writer
            .write_single(Some("abc-123"), &programmatic(pid, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate));
        assert_eq!(store.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_same_key_admits_one() {
        let (store, writer, pid) = setup(WriteMode::Partial, false).await;
        let entry = programmatic(pid, 0);

        let (a, b) = tokio::join!(
            writer.write_single(Some("same"), &entry),
            writer.write_single(Some("same"), &entry)
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(LedgerError::Duplicate))));
        assert_eq!(store.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected_and_key_released() {
        let (store, writer, pid) = setup(WriteMode::Partial, false).await;

        let err = writer
            .write_single(Some("k1"), &programmatic(pid, 999))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ReferenceNotFound(Reference::Category)));
        assert_eq!(store.count_entries().await.unwrap(), 0);

        // Same key succeeds once the payload is fixed.
        assert!(writer
            .write_single(Some("k1"), &programmatic(pid, 0))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected() {
        let (_, writer, pid) = setup(WriteMode::Partial, false).await;
        for key in [None, Some(""), Some("   ")] {
            let err = writer
                .write_single(key, &programmatic(pid, 0))
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::MissingIdempotencyKey));
        }
    }

    #[tokio::test]
    async fn test_update_entry() {
        let (store, writer, pid) = setup(WriteMode::Partial, false).await;
        writer.write_batch(&[valid(pid)]).await.unwrap();
        let id = store.list_entries().await.unwrap()[0].id;

        let edit = raw(json!({
            "data": "01/01/2025",
            "id_imovel": pid,
            "id_categoria": 0,
            "id_situacao": 2,
            "descricao": "IPTU corrigido",
            "valor": "-130"
        }));
        writer.update_entry(id, &edit).await.unwrap();

        let entry = &store.list_entries().await.unwrap()[0];
        assert_eq!(entry.description, "IPTU corrigido");
        assert_eq!(entry.situation_id, 2);
        assert_eq!(entry.amount, dec!(-130));

        let err = writer.update_entry(id + 1, &edit).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let (store, writer, pid) = setup(WriteMode::Partial, false).await;
        writer.write_batch(&[valid(pid)]).await.unwrap();
        let id = store.list_entries().await.unwrap()[0].id;

        writer.delete_entry(id).await.unwrap();
        assert!(matches!(
            writer.delete_entry(id).await,
            Err(LedgerError::NotFound(_))
        ));
    }
}
