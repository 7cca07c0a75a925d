//! In-memory `DataSource` for tests.
//!
//! Applies the same filter/order/limit semantics as the REST endpoint on
//! plain JSON rows so services can be exercised without a network.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use serde_json::Value;

use super::query::{Filter, FilterOp, Query};
use super::{BackendError, DataSource};

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    rpc_results: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    rpc_calls: Mutex<Vec<(String, Value)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Make every call touching `table` fail with a 503.
    pub fn fail_table(&self, table: &str) {
        self.failing.lock().insert(table.to_string());
    }

    pub fn set_rpc_result(&self, function: &str, result: Value) {
        self.rpc_results.lock().insert(function.to_string(), result);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    pub fn rpc_calls(&self) -> Vec<(String, Value)> {
        self.rpc_calls.lock().clone()
    }

    fn check(&self, table: &str) -> Result<(), BackendError> {
        if self.failing.lock().contains(table) {
            return Err(BackendError::Http {
                status: 503,
                message: format!("{} unavailable", table),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DataSource for MemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        self.check(table)?;
        let tables = self.tables.lock();
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((column, ascending)) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(column), b.get(column));
                if *ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError> {
        self.check(table)?;
        self.seed(table, rows);
        Ok(())
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<(), BackendError> {
        self.check(table)?;
        let Some(patch) = patch.as_object() else {
            return Err(BackendError::Parse("patch must be an object".to_string()));
        };
        let mut tables = self.tables.lock();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows
                .iter_mut()
                .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            {
                if let Some(obj) = row.as_object_mut() {
                    for (k, v) in patch {
                        obj.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError> {
        self.check(function)?;
        self.rpc_calls.lock().push((function.to_string(), args));
        self.rpc_results
            .lock()
            .get(function)
            .cloned()
            .ok_or_else(|| BackendError::Http {
                status: 404,
                message: format!("function {} not found", function),
            })
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let cell = row.get(&filter.column).and_then(as_text);
    match filter.op {
        FilterOp::IsNull => cell.is_none(),
        FilterOp::Eq => cell.as_deref() == Some(filter.value.as_str()),
        FilterOp::Neq => cell.as_deref() != Some(filter.value.as_str()),
        FilterOp::Gte => cell
            .map(|c| compare_text(&c, &filter.value) != Ordering::Less)
            .unwrap_or(false),
        FilterOp::Lte => cell
            .map(|c| compare_text(&c, &filter.value) != Ordering::Greater)
            .unwrap_or(false),
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.and_then(as_text), b.and_then(as_text)) {
        (Some(x), Some(y)) => compare_text(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn filters_order_and_limit() {
        let backend = MemoryBackend::new();
        backend.seed(
            "tasks",
            vec![
                json!({ "id": "t1", "event_id": "e1", "due_date": "2026-03-05" }),
                json!({ "id": "t2", "event_id": "e2", "due_date": "2026-03-01" }),
                json!({ "id": "t3", "event_id": "e1", "due_date": "2026-03-02" }),
                json!({ "id": "t4", "event_id": "e1", "due_date": null }),
            ],
        );
        let q = Query::new().eq("event_id", "e1").order("due_date", true).limit(2);
        let rows = backend.select("tasks", &q).await.unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, vec!["t3", "t1"]);

        let nulls = backend
            .select("tasks", &Query::new().is_null("due_date"))
            .await
            .unwrap();
        assert_eq!(nulls.len(), 1);
    }

    #[tokio::test]
    async fn update_patches_matching_rows_only() {
        let backend = MemoryBackend::new();
        backend.seed(
            "guests",
            vec![json!({ "id": "g1", "table_id": null }), json!({ "id": "g2", "table_id": null })],
        );
        backend
            .update("guests", &Query::new().eq("id", "g2"), json!({ "table_id": "t9" }))
            .await
            .unwrap();
        let rows = backend.rows("guests");
        assert!(rows[0]["table_id"].is_null());
        assert_eq!(rows[1]["table_id"], "t9");
    }
}
