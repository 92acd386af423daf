//! List request types: server-side ordering and row filters.
//!
//! A [`ListRequest`] is both what a [`RemoteSource`](super::RemoteSource)
//! executes and (through [`ListRequest::canonical`]) part of the cache key,
//! so two requests that render to the same canonical string share one cache
//! entry.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::types::SortDirection;

// ============================================================================
// OrderBy
// ============================================================================

/// Server-side ordering on one column. Postgres null placement: nulls sort
/// after everything ascending and before everything descending.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }

    /// `name.asc`
    pub fn canonical(&self) -> String {
        format!("{}.{}", self.column, self.direction.as_str())
    }
}

// ============================================================================
// ServerFilter
// ============================================================================

/// A row filter evaluated by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerFilter {
    Eq { column: String, value: String },
    Gte { column: String, value: String },
    Lte { column: String, value: String },
    /// SQL `NOT LIKE`; `%` matches any run, `_` matches one character.
    NotLike { column: String, pattern: String },
}

impl ServerFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn gte(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Gte {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn lte(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Lte {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn not_like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::NotLike {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. }
            | Self::Gte { column, .. }
            | Self::Lte { column, .. }
            | Self::NotLike { column, .. } => column,
        }
    }

    /// `column=op.operand`, the PostgREST spelling with SQL wildcards kept.
    pub fn canonical(&self) -> String {
        match self {
            Self::Eq { column, value } => format!("{column}=eq.{value}"),
            Self::Gte { column, value } => format!("{column}=gte.{value}"),
            Self::Lte { column, value } => format!("{column}=lte.{value}"),
            Self::NotLike { column, pattern } => format!("{column}=not.like.{pattern}"),
        }
    }

    /// Evaluate the filter against a JSON row. SQL null semantics: a missing or
    /// null column never satisfies any filter, including `NOT LIKE`.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(field) = row.get(self.column()).filter(|v| !v.is_null()) else {
            return false;
        };
        match self {
            Self::Eq { value, .. } => scalar_text(field).is_some_and(|s| s == *value),
            Self::Gte { value, .. } => {
                compare_scalar(field, value).is_some_and(|o| o != Ordering::Less)
            }
            Self::Lte { value, .. } => {
                compare_scalar(field, value).is_some_and(|o| o != Ordering::Greater)
            }
            Self::NotLike { pattern, .. } => {
                scalar_text(field).is_some_and(|s| !like_matches(pattern, &s))
            }
        }
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numbers compare numerically, everything else as text (ISO timestamps order
/// correctly as text).
fn compare_scalar(field: &Value, operand: &str) -> Option<Ordering> {
    match field {
        Value::Number(n) => {
            let lhs = n.as_f64()?;
            let rhs: f64 = operand.parse().ok()?;
            lhs.partial_cmp(&rhs)
        }
        other => scalar_text(other).map(|s| s.as_str().cmp(operand)),
    }
}

/// SQL `LIKE` matching (case-sensitive): `%` matches any run of characters,
/// `_` exactly one, everything else itself.
pub fn like_matches(pattern: &str, text: &str) -> bool {
    like_regex(pattern).is_ok_and(|re| re.is_match(text))
}

/// Anchored regex equivalent of a `LIKE` pattern.
fn like_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    source.push('$');
    Regex::new(&source)
}

// ============================================================================
// ListRequest
// ============================================================================

/// What to fetch from a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListRequest {
    /// Column / embed selection; `None` means every column.
    pub select: Option<String>,
    pub order: Vec<OrderBy>,
    pub filters: Vec<ServerFilter>,
}

impl ListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordered(order: OrderBy) -> Self {
        Self {
            order: vec![order],
            ..Self::default()
        }
    }

    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn filter(mut self, filter: ServerFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Stable textual form: `select=*&order=name.asc&col=eq.v...`.
    pub fn canonical(&self) -> String {
        let mut parts = vec![format!("select={}", self.select.as_deref().unwrap_or("*"))];
        if !self.order.is_empty() {
            let order: Vec<String> = self.order.iter().map(OrderBy::canonical).collect();
            parts.push(format!("order={}", order.join(",")));
        }
        parts.extend(self.filters.iter().map(ServerFilter::canonical));
        parts.join("&")
    }

    /// Whether `row` passes every filter.
    pub fn admits(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Order `rows` in place per `self.order` (stable).
    pub fn sort_rows(&self, rows: &mut [Value]) {
        if self.order.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for order in &self.order {
                let cmp = compare_for_order(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                    order.direction,
                );
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });
    }
}

fn compare_for_order(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        // Nulls are "largest": last ascending, first descending.
        (true, false) => direction.apply(Ordering::Greater),
        (false, true) => direction.apply(Ordering::Less),
        (false, false) => direction.apply(compare_non_null(a, b)),
    }
}

fn compare_non_null(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
