//! SQL text for the statements the core generates.
//!
//! Identifiers are quoted for the target backend and placeholders follow its style.
//! A caller-supplied trailing clause is appended verbatim; on PostgreSQL its
//! placeholders must continue the numbering of the generated ones (see
//! [`update_where_sql`]), except for [`update_matching_sql`], which reuses a
//! `SELECT` clause as written.

use crate::db::DatabaseType;

fn column_list(db: DatabaseType, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| db.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn with_clause(mut sql: String, clause: &str) -> String {
    let clause = clause.trim();
    if !clause.is_empty() {
        sql.push(' ');
        sql.push_str(clause);
    }
    sql
}

/// `INSERT INTO t (a, b) VALUES (?, ?), (?, ?), ...` for `rows` rows.
pub fn insert_sql(db: DatabaseType, table: &str, columns: &[&str], rows: usize) -> String {
    let width = columns.len();
    let values = (0..rows)
        .map(|row| format!("({})", db.placeholders(row * width + 1, width)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        db.quote_identifier(table),
        column_list(db, columns),
        values
    )
}

fn set_list(db: DatabaseType, columns: &[&str], first: usize) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", db.quote_identifier(c), db.placeholder(first + i)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `UPDATE t SET a = ?, b = ? WHERE id = ?`; the id is bound last.
pub fn update_by_id_sql(db: DatabaseType, table: &str, columns: &[&str], id_column: &str) -> String {
    format!(
        "UPDATE {} SET {} WHERE {} = {}",
        db.quote_identifier(table),
        set_list(db, columns, 1),
        db.quote_identifier(id_column),
        db.placeholder(columns.len() + 1)
    )
}

/// `UPDATE t SET a = ?, b = ? <clause>`.
///
/// The SET values occupy the first `columns.len()` parameters, so a PostgreSQL clause
/// starts numbering at `$columns.len()+1`.
pub fn update_where_sql(db: DatabaseType, table: &str, columns: &[&str], clause: &str) -> String {
    with_clause(
        format!(
            "UPDATE {} SET {}",
            db.quote_identifier(table),
            set_list(db, columns, 1)
        ),
        clause,
    )
}

/// `UPDATE t SET a = ?, b = ? <clause>` for a clause already numbered from `$1`.
///
/// On PostgreSQL the SET placeholders start after the `clause_params` clause
/// parameters and the clause arguments are bound first. With `?` placeholders the
/// SET values are bound first. [`update_matching_params`] produces that order.
pub fn update_matching_sql(
    db: DatabaseType,
    table: &str,
    columns: &[&str],
    clause: &str,
    clause_params: usize,
) -> String {
    let first = if db.numbered_placeholders() {
        clause_params + 1
    } else {
        1
    };
    with_clause(
        format!(
            "UPDATE {} SET {}",
            db.quote_identifier(table),
            set_list(db, columns, first)
        ),
        clause,
    )
}

/// Parameters for [`update_matching_sql`] in binding order.
pub fn update_matching_params<V: Clone>(db: DatabaseType, set_values: &[V], args: &[V]) -> Vec<V> {
    let (head, tail) = if db.numbered_placeholders() {
        (args, set_values)
    } else {
        (set_values, args)
    };
    head.iter().chain(tail).cloned().collect()
}

/// `SELECT a, b FROM t <clause>`.
pub fn select_sql(db: DatabaseType, table: &str, columns: &[&str], clause: &str) -> String {
    with_clause(
        format!(
            "SELECT {} FROM {}",
            column_list(db, columns),
            db.quote_identifier(table)
        ),
        clause,
    )
}

/// `DELETE FROM t <clause>`.
pub fn delete_sql(db: DatabaseType, table: &str, clause: &str) -> String {
    with_clause(format!("DELETE FROM {}", db.quote_identifier(table)), clause)
}
