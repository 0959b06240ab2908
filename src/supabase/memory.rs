//! In-memory data service that evaluates [`TableQuery`] over stored rows.
//!
//! Used by tests and offline demos. Semantics follow the hosted service:
//! nulls sort last ascending and first descending, `ilike` is a
//! case-insensitive substring test in which `*` and `%` match any run of
//! characters and `_` matches one, inserts get an `id` and timestamps.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::query::{cell_text, Embed, EmbedKind, Filter, TableQuery};
use super::DataService;
use crate::error::DashboardError;

type Row = Map<String, Value>;

#[derive(Default)]
pub struct MemoryDataService {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    fail_next: RwLock<Option<DashboardError>>,
}

impl MemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row as-is (no id or timestamp generation).
    pub fn seed(&self, table: &str, row: Value) {
        if let Value::Object(map) = row {
            self.tables
                .write()
                .entry(table.to_string())
                .or_default()
                .push(map);
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .read()
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Make the next operation fail with `error`.
    pub fn fail_next(&self, error: DashboardError) {
        *self.fail_next.write() = Some(error);
    }

    fn take_failure(&self) -> Result<(), DashboardError> {
        match self.fail_next.write().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn evaluate(&self, query: &TableQuery) -> Vec<Value> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(&query.table) else {
            return Vec::new();
        };

        let mut matched: Vec<&Row> = rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| filter_matches(f, row)))
            .collect();

        if !query.order.is_empty() {
            matched.sort_by(|a, b| {
                for order in &query.order {
                    let ord = compare_cells(
                        a.get(&order.column).unwrap_or(&Value::Null),
                        b.get(&order.column).unwrap_or(&Value::Null),
                    );
                    let ord = if order.ascending { ord } else { ord.reverse() };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                let mut out = project(row, &query.columns);
                for embed in &query.embeds {
                    out.insert(embed.alias.clone(), resolve_embed(&tables, row, embed));
                }
                Value::Object(out)
            })
            .collect()
    }
}

fn filter_matches(filter: &Filter, row: &Row) -> bool {
    match filter {
        Filter::Eq { column, value } => row
            .get(column)
            .and_then(cell_text)
            .map(|cell| cell == *value)
            .unwrap_or(false),
        Filter::ILike { column, term } => {
            let pattern = ilike_pattern(term);
            like_matches(pattern.as_ref(), row.get(column))
        }
        Filter::OrILike { columns, term } => {
            let pattern = ilike_pattern(term);
            columns
                .iter()
                .any(|c| like_matches(pattern.as_ref(), row.get(c)))
        }
    }
}

/// `ilike.*term*` as a regex. Postgres LIKE wildcards in the term keep
/// their meaning.
fn ilike_pattern(term: &str) -> Option<Regex> {
    let mut pattern = String::from("^.*");
    for ch in term.chars() {
        match ch {
            '*' | '%' => pattern.push_str(".*"),
            '_' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push_str(".*$");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()
}

fn like_matches(pattern: Option<&Regex>, cell: Option<&Value>) -> bool {
    match (pattern, cell.and_then(cell_text)) {
        (Some(pattern), Some(text)) => pattern.is_match(&text),
        _ => false,
    }
}

/// Null compares greater than everything, matching Postgres default ordering.
fn compare_cells(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn project(row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return row.clone();
    }
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn resolve_embed(tables: &HashMap<String, Vec<Row>>, row: &Row, embed: &Embed) -> Value {
    let related = tables.get(&embed.table).map(Vec::as_slice).unwrap_or(&[]);
    match embed.kind {
        EmbedKind::ToOne => {
            let Some(fk) = row.get(&embed.fk_column).and_then(cell_text) else {
                return Value::Null;
            };
            related
                .iter()
                .find(|r| r.get("id").and_then(cell_text).as_deref() == Some(fk.as_str()))
                .map(|r| Value::Object(project(r, &embed.columns)))
                .unwrap_or(Value::Null)
        }
        EmbedKind::ToMany => {
            let Some(id) = row.get("id").and_then(cell_text) else {
                return Value::Array(Vec::new());
            };
            Value::Array(
                related
                    .iter()
                    .filter(|r| {
                        r.get(&embed.fk_column).and_then(cell_text).as_deref() == Some(id.as_str())
                    })
                    .map(|r| Value::Object(project(r, &embed.columns)))
                    .collect(),
            )
        }
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, DashboardError> {
        self.take_failure()?;
        Ok(self.evaluate(query))
    }

    async fn select_single(&self, query: &TableQuery) -> Result<Value, DashboardError> {
        self.take_failure()?;
        let mut rows = self.evaluate(query);
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(DashboardError::NotFound(format!(
                "{}: no matching row",
                query.table
            ))),
            n => Err(DashboardError::Service {
                status: 406,
                message: format!("{}: expected one row, found {}", query.table, n),
            }),
        }
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, DashboardError> {
        self.take_failure()?;
        let Value::Object(mut map) = row else {
            return Err(DashboardError::validation("row", "must be a JSON object"));
        };
        let now = Utc::now().to_rfc3339();
        map.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        map.entry("created_at")
            .or_insert_with(|| Value::String(now.clone()));
        map.entry("updated_at").or_insert_with(|| Value::String(now));

        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(map.clone());
        Ok(Value::Object(map))
    }

    async fn update(&self, query: &TableQuery, patch: Value) -> Result<Vec<Value>, DashboardError> {
        self.take_failure()?;
        if !query.has_filters() {
            return Err(DashboardError::validation(
                "filters",
                "refusing to update every row of a table",
            ));
        }
        let Value::Object(patch) = patch else {
            return Err(DashboardError::validation("patch", "must be a JSON object"));
        };
        let now = Value::String(Utc::now().to_rfc3339());

        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(&query.table) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if query.filters.iter().all(|f| filter_matches(f, row)) {
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                row.insert("updated_at".to_string(), now.clone());
                updated.push(Value::Object(row.clone()));
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> MemoryDataService {
        let svc = MemoryDataService::new();
        svc.seed("campaigns", json!({"id": "c1", "name": "Q1 Push", "status": "active"}));
        svc.seed("campaigns", json!({"id": "c2", "name": "Cold", "status": "draft"}));
        svc.seed(
            "leads",
            json!({"id": "l1", "first_name": "Ada", "company": "Acme", "status": "pending",
                   "campaign_id": "c1", "created_at": "2026-01-01"}),
        );
        svc.seed(
            "leads",
            json!({"id": "l2", "first_name": "Bob", "company": null, "status": "converted",
                   "campaign_id": "c1", "created_at": "2026-01-03"}),
        );
        svc.seed(
            "leads",
            json!({"id": "l3", "first_name": "Cy", "company": "ACME Corp", "status": "pending",
                   "campaign_id": "c2", "created_at": "2026-01-02"}),
        );
        svc
    }

    fn ids(rows: &[Value]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn filters_and_orders() {
        let svc = seeded();
        let rows = svc
            .select(
                &TableQuery::from("leads")
                    .or_ilike(&["first_name", "company"], "acme")
                    .order("created_at", false),
            )
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec!["l3", "l1"]);

        let rows = svc
            .select(&TableQuery::from("leads").eq("status", "converted"))
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec!["l2"]);
    }

    #[tokio::test]
    async fn like_wildcards_in_search_term() {
        let svc = seeded();
        let by_company = |term: &str| TableQuery::from("leads").ilike("company", term);

        let rows = svc.select(&by_company("ac_e")).await.unwrap();
        assert_eq!(ids(&rows), vec!["l1", "l3"]);
        let rows = svc.select(&by_company("a%corp")).await.unwrap();
        assert_eq!(ids(&rows), vec!["l3"]);
        let rows = svc.select(&by_company("acme.")).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn unknown_status_matches_nothing() {
        let svc = seeded();
        let rows = svc
            .select(&TableQuery::from("leads").eq("status", "archived"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn range_pages_through_ordered_rows() {
        let svc = seeded();
        let q = TableQuery::from("leads").order("created_at", true);
        let first = svc.select(&q.clone().range(0, 1)).await.unwrap();
        let second = svc.select(&q.range(2, 3)).await.unwrap();
        assert_eq!(ids(&first), vec!["l1", "l3"]);
        assert_eq!(ids(&second), vec!["l2"]);
    }

    #[tokio::test]
    async fn nulls_sort_last_ascending() {
        let svc = seeded();
        let rows = svc
            .select(&TableQuery::from("leads").order("company", true))
            .await
            .unwrap();
        // byte order: "ACME Corp" < "Acme"
        assert_eq!(ids(&rows), vec!["l3", "l1", "l2"]);
    }

    #[tokio::test]
    async fn embeds_resolve_both_directions() {
        let svc = seeded();
        let leads = svc
            .select(
                &TableQuery::from("leads")
                    .select(&["id"])
                    .embed(Embed::to_one("campaigns", "campaigns", "campaign_id", &["name"]))
                    .eq("id", "l1"),
            )
            .await
            .unwrap();
        assert_eq!(leads[0], json!({"id": "l1", "campaigns": {"name": "Q1 Push"}}));

        let campaigns = svc
            .select(
                &TableQuery::from("campaigns")
                    .embed(Embed::to_many("leads", "leads", "campaign_id", &["id", "status"]))
                    .eq("id", "c1"),
            )
            .await
            .unwrap();
        assert_eq!(campaigns[0]["leads"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn single_reports_missing_row() {
        let svc = seeded();
        let err = svc
            .select_single(&TableQuery::from("leads").eq("id", "nope").single())
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotFound(_)));
    }

    #[tokio::test]
    async fn insert_and_update_return_rows() {
        let svc = MemoryDataService::new();
        let row = svc
            .insert("leads", json!({"first_name": "Dee", "status": "pending"}))
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap().to_string();
        assert!(row["created_at"].is_string());

        let updated = svc
            .update(
                &TableQuery::from("leads").eq("id", id.clone()),
                json!({"status": "contacted"}),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["status"], "contacted");
        assert_eq!(svc.rows("leads")[0]["status"], "contacted");
    }

    #[tokio::test]
    async fn unfiltered_update_is_rejected() {
        let svc = seeded();
        let err = svc
            .update(&TableQuery::from("leads"), json!({"status": "converted"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Validation { .. }));
    }

    #[tokio::test]
    async fn injected_failure_hits_once() {
        let svc = seeded();
        svc.fail_next(DashboardError::Network("down".into()));
        assert!(svc.select(&TableQuery::from("leads")).await.is_err());
        assert!(svc.select(&TableQuery::from("leads")).await.is_ok());
    }
}
