//! [`ListRequest`] to PostgREST query parameters.

use stockflow_admin::remote::{ListRequest, ServerFilter};

/// Query pairs for a list call, in a stable order: `select`, `order`, then filters.
pub fn list_params(request: &ListRequest) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        request.select.clone().unwrap_or_else(|| "*".to_string()),
    )];
    if !request.order.is_empty() {
        let order: Vec<String> = request.order.iter().map(|o| o.canonical()).collect();
        params.push(("order".to_string(), order.join(",")));
    }
    params.extend(request.filters.iter().map(filter_param));
    params
}

/// One filter as `(column, "op.operand")`.
pub fn filter_param(filter: &ServerFilter) -> (String, String) {
    let operand = match filter {
        ServerFilter::Eq { value, .. } => format!("eq.{value}"),
        ServerFilter::Gte { value, .. } => format!("gte.{value}"),
        ServerFilter::Lte { value, .. } => format!("lte.{value}"),
        ServerFilter::NotLike { pattern, .. } => format!("not.like.{}", like_pattern(pattern)),
    };
    (filter.column().to_string(), operand)
}

/// Row selector for single-row calls.
pub fn id_param(id: &str) -> (String, String) {
    ("id".to_string(), format!("eq.{id}"))
}

/// PostgREST spells the SQL `%` wildcard as `*` in URLs.
pub fn like_pattern(pattern: &str) -> String {
    pattern.replace('%', "*")
}
