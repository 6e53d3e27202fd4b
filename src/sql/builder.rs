//! Builds parameterized statements for generic table actions.

use crate::sql::params::BindValue;

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

/// COUNT(*) over one table.
pub fn count(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", quoted(table))
}

/// INSERT with one placeholder per supplied column, in the given order.
/// Columns left to the store's own defaults are simply not mentioned.
/// With nothing supplied at all, every column defaults.
pub fn insert(table: &str, columns: &[(String, BindValue)]) -> QueryBuf {
    if columns.is_empty() {
        return QueryBuf {
            sql: format!("INSERT INTO {} DEFAULT VALUES", quoted(table)),
            params: Vec::new(),
        };
    }
    let names: Vec<String> = columns.iter().map(|(n, _)| quoted(n)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    QueryBuf {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted(table),
            names.join(", "),
            placeholders.join(", ")
        ),
        params: columns.iter().map(|(_, v)| v.clone()).collect(),
    }
}
