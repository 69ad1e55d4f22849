//! Incremental query construction
//!
//! Builds the SOQL text for one stream. A cursor predicate and ordering are
//! added only when both a cursor field and a previous high-water mark exist;
//! the value is compared as an unquoted datetime literal.

use crate::types::ResultCap;
use std::fmt::Write;

/// Build the query for an object
///
/// `SELECT {fields} FROM {object}`, then
/// ` WHERE {cursor} > {last} ORDER BY {cursor} ASC` when incremental, then
/// ` LIMIT {n}` when capped.
pub fn build_query(
    fields: &[String],
    object: &str,
    cursor_field: Option<&str>,
    last_value: Option<&str>,
    cap: ResultCap,
) -> String {
    let mut query = format!("SELECT {} FROM {object}", fields.join(", "));

    let cursor = cursor_field.filter(|f| !f.is_empty());
    let last = last_value.filter(|v| !v.is_empty());
    if let (Some(field), Some(value)) = (cursor, last) {
        let _ = write!(query, " WHERE {field} > {value} ORDER BY {field} ASC");
    }

    if let ResultCap::Limit(n) = cap {
        let _ = write!(query, " LIMIT {n}");
    }

    query
}
