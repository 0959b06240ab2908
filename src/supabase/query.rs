//! Table query builder for the PostgREST-style data API.
//!
//! A `TableQuery` is plain data; `RestDataService` renders it into query
//! parameters and `MemoryDataService` evaluates it directly, so both agree
//! on filter semantics.

use serde_json::Value;

/// Relation pulled into each row alongside the base columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub alias: String,
    pub table: String,
    /// For `ToOne`, the column on the base row pointing at `table.id`.
    /// For `ToMany`, the column on `table` pointing back at the base row's id.
    pub fk_column: String,
    pub columns: Vec<String>,
    pub kind: EmbedKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    ToOne,
    ToMany,
}

impl Embed {
    pub fn to_one(alias: &str, table: &str, fk_column: &str, columns: &[&str]) -> Self {
        Self {
            alias: alias.to_string(),
            table: table.to_string(),
            fk_column: fk_column.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind: EmbedKind::ToOne,
        }
    }

    pub fn to_many(alias: &str, table: &str, fk_column: &str, columns: &[&str]) -> Self {
        Self {
            kind: EmbedKind::ToMany,
            ..Self::to_one(alias, table, fk_column, columns)
        }
    }

    fn render(&self) -> String {
        let cols = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        };
        match self.kind {
            EmbedKind::ToOne => format!("{}:{}({})", self.alias, self.fk_column, cols),
            EmbedKind::ToMany => {
                format!("{}:{}!{}({})", self.alias, self.table, self.fk_column, cols)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { column: String, value: String },
    /// Case-insensitive substring match.
    ILike { column: String, term: String },
    /// Case-insensitive substring match against any of the columns.
    OrILike { columns: Vec<String>, term: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub single: bool,
}

impl TableQuery {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            offset: None,
            limit: None,
            single: false,
        }
    }

    /// Base columns; empty or `["*"]` selects all.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn ilike(mut self, column: &str, term: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike {
            column: column.to_string(),
            term: term.into(),
        });
        self
    }

    pub fn or_ilike(mut self, columns: &[&str], term: impl Into<String>) -> Self {
        self.filters.push(Filter::OrILike {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            term: term.into(),
        });
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    /// Inclusive row range, as used by page requests.
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Expect exactly one row.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// The `select=` value, including embedded relations.
    pub fn select_clause(&self) -> String {
        let mut parts: Vec<String> = if self.columns.is_empty() {
            vec!["*".to_string()]
        } else {
            self.columns.clone()
        };
        parts.extend(self.embeds.iter().map(Embed::render));
        parts.join(",")
    }

    /// Query parameters in PostgREST syntax, unencoded.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select_clause())];

        for filter in &self.filters {
            match filter {
                Filter::Eq { column, value } => {
                    params.push((column.clone(), format!("eq.{}", value)));
                }
                Filter::ILike { column, term } => {
                    params.push((column.clone(), format!("ilike.*{}*", term)));
                }
                Filter::OrILike { columns, term } => {
                    let pattern = quote_or_value(&format!("*{}*", term));
                    let clauses: Vec<String> = columns
                        .iter()
                        .map(|c| format!("{}.ilike.{}", c, pattern))
                        .collect();
                    params.push(("or".to_string(), format!("({})", clauses.join(","))));
                }
            }
        }

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|o| {
                    format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" })
                })
                .collect();
            params.push(("order".to_string(), order.join(",")));
        }

        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }
}

/// Values inside `or=(...)` must be double-quoted when they contain
/// PostgREST reserved characters.
fn quote_or_value(value: &str) -> String {
    if value.contains([',', '(', ')', '.', ':', '"', '\\']) {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}

/// String form of a cell for equality and substring checks.
/// `null` has no string form and never matches.
pub(crate) fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn renders_select_with_to_one_embed() {
        let q = TableQuery::from("leads")
            .select(&["id", "first_name"])
            .embed(Embed::to_one("campaigns", "campaigns", "campaign_id", &["name"]));
        assert_eq!(q.select_clause(), "id,first_name,campaigns:campaign_id(name)");
    }

    #[test]
    fn renders_to_many_embed_and_star() {
        let q = TableQuery::from("campaigns").embed(Embed::to_many(
            "leads",
            "leads",
            "campaign_id",
            &["id", "status"],
        ));
        assert_eq!(q.select_clause(), "*,leads:leads!campaign_id(id,status)");
    }

    #[test]
    fn renders_filters_order_and_range() {
        let q = TableQuery::from("leads")
            .or_ilike(&["first_name", "email"], "acme")
            .eq("status", "pending")
            .ilike("name", "Q1")
            .order("created_at", false)
            .range(50, 99);
        let params = q.to_params();
        assert_eq!(
            param(&params, "or"),
            Some("(first_name.ilike.*acme*,email.ilike.*acme*)")
        );
        assert_eq!(param(&params, "status"), Some("eq.pending"));
        assert_eq!(param(&params, "name"), Some("ilike.*Q1*"));
        assert_eq!(param(&params, "order"), Some("created_at.desc"));
        assert_eq!(param(&params, "offset"), Some("50"));
        assert_eq!(param(&params, "limit"), Some("50"));
    }

    #[test]
    fn or_values_with_reserved_chars_are_quoted() {
        let q = TableQuery::from("leads").or_ilike(&["company"], "acme, inc.");
        let params = q.to_params();
        assert_eq!(param(&params, "or"), Some("(company.ilike.\"*acme, inc.*\")"));
    }

    #[test]
    fn cell_text_skips_null() {
        assert_eq!(cell_text(&Value::Null), None);
        assert_eq!(cell_text(&serde_json::json!(12)), Some("12".into()));
        assert_eq!(cell_text(&serde_json::json!("x")), Some("x".into()));
    }
}
