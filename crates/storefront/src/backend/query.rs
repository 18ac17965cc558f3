//! Row filters for [`TableStore`](super::TableStore) calls.
//!
//! Only what the storefront needs: equality filters, a single sort column
//! and a limit. Rendered to PostgREST query parameters by the hosted client
//! and evaluated directly by the in-memory backend.

use std::cmp::Ordering;

use serde_json::Value;

/// Sort order for a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A select/update/delete filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    columns: Option<String>,
    filters: Vec<(String, String)>,
    order: Option<Order>,
    limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the returned columns (default `*`).
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    /// Keep rows where `column` equals `value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// PostgREST query parameters, in a stable order.
    #[must_use]
    pub fn to_postgrest_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.columns.clone().unwrap_or_else(|| "*".to_string()),
        )];
        for (column, value) in &self.filters {
            params.push((column.clone(), format!("eq.{value}")));
        }
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{direction}", order.column)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Filters without select/order/limit, for update and delete.
    #[must_use]
    pub fn to_filter_params(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{value}")))
            .collect()
    }

    /// Whether `row` passes every equality filter.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, value)| row.get(column).is_some_and(|v| render(v) == *value))
    }

    /// Filter, sort and truncate `rows` the way the hosted service would.
    #[must_use]
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
        let mut selected: Vec<Value> = rows
            .into_iter()
            .filter(|row| self.matches(row))
            .cloned()
            .collect();

        if let Some(order) = &self.order {
            selected.sort_by(|a, b| {
                let ordering = compare(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Missing and null sort last in ascending order, like Postgres.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.filter(|v| !v.is_null()), b.filter(|v| !v.is_null())) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => render(x).cmp(&render(y)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_postgrest_params() {
        let query = Query::new()
            .eq("id", "42")
            .order_by("created_at", false)
            .limit(1);
        let params = query.to_postgrest_params();
        assert_eq!(
            params,
            vec![
                ("select".to_string(), "*".to_string()),
                ("id".to_string(), "eq.42".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_filter_params_skip_select() {
        let query = Query::new().select("id").eq("id", "7").limit(1);
        assert_eq!(
            query.to_filter_params(),
            vec![("id".to_string(), "eq.7".to_string())]
        );
    }

    #[test]
    fn test_apply_filters_and_sorts() {
        let rows = [
            json!({"id": "a", "created_at": "2024-01-01T00:00:00Z"}),
            json!({"id": "b", "created_at": "2024-03-01T00:00:00Z"}),
            json!({"id": "c", "created_at": "2024-02-01T00:00:00Z"}),
        ];
        let query = Query::new().order_by("created_at", false);
        let ids: Vec<Value> = query.apply(&rows).into_iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("b"), json!("c"), json!("a")]);

        let only_c = Query::new().eq("id", "c").apply(&rows);
        assert_eq!(only_c.len(), 1);
    }

    #[test]
    fn test_matches_non_string_values() {
        let row = json!({"price": 10, "active": true});
        assert!(Query::new().eq("price", 10).matches(&row));
        assert!(Query::new().eq("active", true).matches(&row));
        assert!(!Query::new().eq("missing", 1).matches(&row));
    }
}
