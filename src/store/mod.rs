//! Content store gateway
//!
//! Typed read/write accessors over the two record shapes the site uses:
//! singletons (at most one row per concern) and collections (many ordered
//! rows per concern). All operations go through a [`StoreBackend`], so the
//! same gateway runs against the remote store or an in-memory table map.

mod backend;
mod records;

pub use backend::{
    Filter, MemoryBackend, Order, RestBackend, StoreBackend, StoreError, StoreResult,
};
pub use records::*;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use backend::merge_fields;

/// Typed gateway over a store backend.
///
/// Cheap to clone; all clones share the backend.
#[derive(Clone)]
pub struct ContentStore {
    backend: Arc<dyn StoreBackend>,
}

impl ContentStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// The one row for a singleton concern, or `None` when no row exists
    /// yet. Should duplicates ever exist (see [`Self::upsert_singleton`]),
    /// the oldest row wins, deterministically.
    pub async fn singleton<R: SingletonRecord>(&self) -> StoreResult<Option<R>> {
        let rows = self
            .backend
            .select(
                R::CONCERN.table(),
                &Filter::default(),
                &[Order::asc("created_at")],
            )
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Create-or-update the one row for a singleton concern.
    ///
    /// When no row exists, one is created from the record's defaults with
    /// the patch merged over them; otherwise only the patch's set fields are
    /// written. The existence check and the insert are separate store calls,
    /// so two concurrent first writes can race; the store's unique key turns
    /// the loser's insert into a conflict, which is retried here as an
    /// update.
    pub async fn upsert_singleton<R, P>(&self, patch: &P) -> StoreResult<R>
    where
        R: SingletonRecord,
        P: Serialize + Sync,
    {
        let table = R::CONCERN.table();
        let patch_value = stamped_patch(patch)?;

        if let Some(existing) = self.singleton::<R>().await? {
            return self
                .apply_update(table, existing.record_id(), patch_value)
                .await;
        }

        let mut row = serde_json::to_value(R::default())?;
        merge_fields(&mut row, &patch_value);
        match self.backend.insert(table, row).await {
            Ok(inserted) => Ok(serde_json::from_value(inserted)?),
            Err(StoreError::Conflict) => {
                tracing::debug!("lost {} upsert race, retrying as update", table);
                let existing = self
                    .singleton::<R>()
                    .await?
                    .ok_or(StoreError::RowMissing)?;
                self.apply_update(table, existing.record_id(), patch_value)
                    .await
            }
            Err(err) => Err(err),
        }
    }

    /// All matching rows of a collection concern.
    ///
    /// Orderable concerns come back in ascending display order with creation
    /// time as the tiebreak; contact submissions come back newest first.
    pub async fn list<R: CollectionRecord>(&self, filter: Filter) -> StoreResult<Vec<R>> {
        let order = collection_order(R::CONCERN);
        let rows = self
            .backend
            .select(R::CONCERN.table(), &filter, &order)
            .await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }

    /// One collection row by id, or `None`
    pub async fn get_one<R: CollectionRecord>(&self, id: Uuid) -> StoreResult<Option<R>> {
        let rows = self
            .backend
            .select(
                R::CONCERN.table(),
                &Filter::new().eq("id", id.to_string()),
                &[],
            )
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Append a row to a collection concern.
    ///
    /// Orderable concerns get the next free display-order value; existing
    /// rows are never renumbered here, that is [`Self::reorder`]'s job.
    pub async fn add<R, P>(&self, fields: &P) -> StoreResult<R>
    where
        R: CollectionRecord,
        P: Serialize + Sync,
    {
        let table = R::CONCERN.table();
        let mut row = serde_json::to_value(R::default())?;
        let fields_value = serde_json::to_value(fields)?;
        merge_fields(&mut row, &fields_value);

        if R::CONCERN.is_ordered() {
            let next = self.next_display_order(R::CONCERN).await?;
            if let Value::Object(map) = &mut row {
                map.insert("display_order".to_string(), json!(next));
            }
        }

        let inserted = self.backend.insert(table, row).await?;
        Ok(serde_json::from_value(inserted)?)
    }

    /// Patch one collection row
    pub async fn update_in<R, P>(&self, id: Uuid, patch: &P) -> StoreResult<R>
    where
        R: CollectionRecord,
        P: Serialize + Sync,
    {
        self.apply_update(R::CONCERN.table(), id, stamped_patch(patch)?)
            .await
    }

    /// Delete one collection row; deleting an absent id succeeds
    pub async fn remove<R: CollectionRecord>(&self, id: Uuid) -> StoreResult<()> {
        self.backend.delete(R::CONCERN.table(), id).await
    }

    /// Reassign each id's display order to its index in `ordered_ids`.
    ///
    /// A sequence of idempotent single-row writes, not one atomic
    /// transaction: a failure partway leaves the earlier rows renumbered
    /// and the rest untouched. Re-running with the same ids repairs the
    /// order. Ids with no matching row are skipped with a warning.
    pub async fn reorder<R: CollectionRecord>(&self, ordered_ids: &[Uuid]) -> StoreResult<()> {
        let table = R::CONCERN.table();
        for (index, id) in ordered_ids.iter().enumerate() {
            let patch = json!({
                "display_order": index as i64,
                "updated_at": Utc::now(),
            });
            let matched = self.backend.update(table, *id, patch).await?;
            if matched.is_empty() {
                tracing::warn!("reorder: no {} row with id {}", table, id);
            }
        }
        Ok(())
    }

    async fn apply_update<R>(&self, table: &str, id: Uuid, patch: Value) -> StoreResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let rows = self.backend.update(table, id, patch).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => Err(StoreError::RowMissing),
        }
    }

    async fn next_display_order(&self, concern: Concern) -> StoreResult<i64> {
        let rows = self
            .backend
            .select(
                concern.table(),
                &Filter::default(),
                &[Order::desc("display_order")],
            )
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("display_order"))
            .and_then(Value::as_i64)
            .map(|highest| highest + 1)
            .unwrap_or(0))
    }
}

fn collection_order(concern: Concern) -> Vec<Order> {
    if concern.is_ordered() {
        vec![Order::asc("display_order"), Order::asc("created_at")]
    } else {
        vec![Order::desc("created_at")]
    }
}

/// Serialize a patch and stamp it with the write time
fn stamped_patch<P: Serialize>(patch: &P) -> StoreResult<Value> {
    let value = serde_json::to_value(patch)?;
    match value {
        Value::Object(mut map) => {
            map.insert("updated_at".to_string(), json!(Utc::now()));
            Ok(Value::Object(map))
        }
        _ => Err(StoreError::Decode(serde::de::Error::custom(
            "patch must serialize to a JSON object",
        ))),
    }
}
