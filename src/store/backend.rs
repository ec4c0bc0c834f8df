//! Store backends
//!
//! The gateway talks to the remote relational store through the
//! [`StoreBackend`] seam: JSON rows in, JSON rows out. [`RestBackend`] speaks
//! the store's REST row API; [`MemoryBackend`] keeps tables in process for
//! tests and records every operation it performs.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors crossing the store seam.
///
/// "Not found" is never an error here; absent rows come back as empty
/// result sets and the gateway turns them into `None`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store was unreachable or the connection failed mid-request
    #[error("store transport failure: {0}")]
    Transport(String),

    /// The store answered with a non-success status
    #[error("store rejected request ({status}): {message}")]
    Backend { status: u16, message: String },

    /// An insert collided with an existing row (unique key)
    #[error("row already exists")]
    Conflict,

    /// An update or lookup targeted an id with no matching row
    #[error("no row matched the given id")]
    RowMissing,

    /// A row did not decode into the expected record shape
    #[error("failed to decode store row: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One ordering key for a select
#[derive(Debug, Clone, Copy)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

/// Equality conditions applied to a select
#[derive(Debug, Default, Clone)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column` to equal `value`
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Row-level operations every store backend provides
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Matching rows, in the requested order
    async fn select(&self, table: &str, filter: &Filter, order: &[Order])
        -> StoreResult<Vec<Value>>;

    /// Insert a complete row; returns the stored row
    async fn insert(&self, table: &str, row: Value) -> StoreResult<Value>;

    /// Patch the row with the given id; returns the matched rows (possibly
    /// empty when the id does not exist)
    async fn update(&self, table: &str, id: Uuid, patch: Value) -> StoreResult<Vec<Value>>;

    /// Delete the row with the given id; deleting an absent row succeeds
    async fn delete(&self, table: &str, id: Uuid) -> StoreResult<()>;
}

/// Shallow-merge `patch` object fields over `base`
pub(crate) fn merge_fields(base: &mut Value, patch: &Value) {
    if let (Value::Object(base_map), Value::Object(patch_map)) = (base, patch) {
        for (key, value) in patch_map {
            base_map.insert(key.clone(), value.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// REST backend
// ---------------------------------------------------------------------------

/// Backend speaking the remote store's REST row API
/// (`{base}/rest/v1/{table}`), authenticated with a bearer key.
pub struct RestBackend {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl RestBackend {
    /// Build a client with the given ambient request timeout
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn filter_query(filter: &Filter) -> Vec<(String, String)> {
        filter
            .conditions()
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{}", scalar_text(value))))
            .collect()
    }

    fn order_query(order: &[Order]) -> Option<(String, String)> {
        if order.is_empty() {
            return None;
        }
        let keys = order
            .iter()
            .map(|o| {
                format!(
                    "{}.{}",
                    o.column,
                    if o.ascending { "asc" } else { "desc" }
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        Some(("order".to_string(), keys))
    }

    async fn check(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::CONFLICT {
            return Err(StoreError::Conflict);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Backend {
            status: status.as_u16(),
            message,
        })
    }
}

/// Filter values rendered the way the row API expects them
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl StoreBackend for RestBackend {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: &[Order],
    ) -> StoreResult<Vec<Value>> {
        let mut query = vec![("select".to_string(), "*".to_string())];
        query.extend(Self::filter_query(filter));
        if let Some(order_param) = Self::order_query(order) {
            query.push(order_param);
        }

        let response = self
            .authed(self.client.get(self.table_url(table)))
            .query(&query)
            .send()
            .await?;
        let rows = Self::check(response).await?.json::<Vec<Value>>().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> StoreResult<Value> {
        let response = self
            .authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let mut rows = Self::check(response).await?.json::<Vec<Value>>().await?;
        if rows.is_empty() {
            return Err(StoreError::Backend {
                status: 200,
                message: "insert returned no representation".to_string(),
            });
        }
        Ok(rows.remove(0))
    }

    async fn update(&self, table: &str, id: Uuid, patch: Value) -> StoreResult<Vec<Value>> {
        let response = self
            .authed(self.client.patch(self.table_url(table)))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let rows = Self::check(response).await?.json::<Vec<Value>>().await?;
        Ok(rows)
    }

    async fn delete(&self, table: &str, id: Uuid) -> StoreResult<()> {
        let response = self
            .authed(self.client.delete(self.table_url(table)))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memory backend
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-process backend for tests and offline use.
///
/// Records every operation in an op log so tests can assert on call order
/// and counts. Tables registered via [`MemoryBackend::enforce_single_row`]
/// reject a second insert with [`StoreError::Conflict`], mirroring the
/// store-level unique key on singleton tables.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    single_row_tables: Mutex<HashSet<String>>,
    ops: Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make inserts into `table` conflict once a row exists
    pub fn enforce_single_row(&self, table: &str) {
        lock(&self.single_row_tables).insert(table.to_string());
    }

    /// Snapshot of the operations performed so far, oldest first
    pub fn ops(&self) -> Vec<String> {
        lock(&self.ops).clone()
    }

    /// Raw rows currently stored in `table`
    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }

    fn record_op(&self, op: &str, table: &str) {
        lock(&self.ops).push(format!("{op} {table}"));
    }
}

/// Ordering for JSON scalars; numbers and RFC 3339 strings both sort
/// correctly under it
fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn row_matches(row: &Value, filter: &Filter) -> bool {
    filter
        .conditions()
        .iter()
        .all(|(column, value)| row.get(column) == Some(value))
}

fn row_id_matches(row: &Value, id: Uuid) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id.to_string().as_str())
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: &[Order],
    ) -> StoreResult<Vec<Value>> {
        self.record_op("select", table);
        let tables = lock(&self.tables);
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row_matches(row, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            for key in order {
                let ordering = compare_values(
                    a.get(key.column).unwrap_or(&Value::Null),
                    b.get(key.column).unwrap_or(&Value::Null),
                );
                let ordering = if key.ascending {
                    ordering
                } else {
                    ordering.reverse()
                };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> StoreResult<Value> {
        self.record_op("insert", table);
        let mut tables = lock(&self.tables);
        let rows = tables.entry(table.to_string()).or_default();
        if !rows.is_empty() && lock(&self.single_row_tables).contains(table) {
            return Err(StoreError::Conflict);
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: Uuid, patch: Value) -> StoreResult<Vec<Value>> {
        self.record_op("update", table);
        let mut tables = lock(&self.tables);
        let mut matched = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| row_id_matches(row, id)) {
                merge_fields(row, &patch);
                matched.push(row.clone());
            }
        }
        Ok(matched)
    }

    async fn delete(&self, table: &str, id: Uuid) -> StoreResult<()> {
        self.record_op("delete", table);
        let mut tables = lock(&self.tables);
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| !row_id_matches(row, id));
        }
        Ok(())
    }
}
