//! Row selection queries.
//!
//! A [`RowQuery`] is a small, backend-neutral description of a `SELECT`:
//! equality and case-insensitive substring filters, ordering and a page
//! window. The REST adapter renders it as query-string parameters; in-memory
//! stores can evaluate it directly with [`RowQuery::apply`].

use std::cmp::Ordering;

use serde_json::Value;

/// A row predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`.
    Eq(String, String),
    /// Any of `columns` contains `needle`, ignoring case.
    ContainsAny(Vec<String>, String),
}

impl Filter {
    /// Shorthand for [`Filter::Eq`].
    pub fn eq(column: &str, value: impl Into<String>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    /// Evaluate the predicate against a JSON row.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::Eq(column, value) => match row.get(column) {
                Some(Value::String(s)) => s == value,
                Some(Value::Null) | None => false,
                Some(other) => other.to_string() == *value,
            },
            Filter::ContainsAny(columns, needle) => {
                let needle = needle.to_lowercase();
                columns.iter().any(|c| {
                    row.get(c)
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
                })
            }
        }
    }

    fn to_param(&self) -> (String, String) {
        match self {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{value}")),
            Filter::ContainsAny(columns, needle) => {
                // Reserved characters in the needle would break the `or` group.
                let needle: String = needle
                    .chars()
                    .map(|c| if matches!(c, ',' | '(' | ')' | '*') { ' ' } else { c })
                    .collect();
                let clauses: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{c}.ilike.*{needle}*"))
                    .collect();
                ("or".to_string(), format!("({})", clauses.join(",")))
            }
        }
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Column name.
    pub column: String,
    /// Descending order.
    pub descending: bool,
}

impl Order {
    /// Ascending by `column`.
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    /// Descending by `column`.
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }
}

/// A selection over one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowQuery {
    /// Conjunction of predicates.
    pub filters: Vec<Filter>,
    /// Sort keys, most significant first.
    pub order: Vec<Order>,
    /// Rows to skip.
    pub offset: Option<u64>,
    /// Maximum rows to return.
    pub limit: Option<u64>,
    /// Whether the total match count is wanted.
    pub count: bool,
}

/// Result of a selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPage {
    /// Returned rows.
    pub rows: Vec<Value>,
    /// Total matching rows, when requested.
    pub total: Option<u64>,
}

impl RowQuery {
    /// Empty query selecting every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a sort key.
    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    /// Restrict to a page window.
    pub fn window(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Ask for the total count.
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Render as REST query parameters.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(self.filters.iter().map(Filter::to_param));
        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|o| {
                    let dir = if o.descending { "desc" } else { "asc" };
                    format!("{}.{dir}", o.column)
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

    /// Evaluate the query over rows held in memory.
    pub fn apply(&self, rows: impl IntoIterator<Item = Value>) -> RowPage {
        let mut rows: Vec<Value> = rows
            .into_iter()
            .filter(|row| self.filters.iter().all(|f| f.matches(row)))
            .collect();
        rows.sort_by(|a, b| {
            for order in &self.order {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                let ord = if order.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let total = self.count.then_some(rows.len() as u64);
        let offset = self.offset.unwrap_or(0) as usize;
        let limit = self.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let rows = rows.into_iter().skip(offset).take(limit).collect();
        RowPage { rows, total }
    }
}

/// Null compares greater than any value, as in Postgres.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => match (x.as_str(), y.as_str()) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => x.to_string().cmp(&y.to_string()),
        },
    }
}
