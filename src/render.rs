//! Rendering of a validated [SchemaChange] list into SQLite statements.
//!
//! Rendering is the only dialect-aware step. SQLite cannot attach a foreign
//! key to an existing table, so constraints are folded into the CREATE
//! statement of their child table; [SchemaPlan::build](crate::SchemaPlan::build)
//! has already guaranteed the child is created within the same change list.

use std::collections::HashMap;

use crate::error::Error;
use crate::schema::{ColumnSpec, ColumnType, DefaultValue, ForeignKeySpec, SchemaChange, Value};

/// A rendered statement with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub sql: String,
    pub params: Vec<rusqlite::types::Value>,
}

impl Statement {
    fn bare(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }
}

pub(crate) fn render_changes(changes: &[SchemaChange]) -> Result<Vec<Statement>, Error> {
    // Fold foreign keys onto the CREATE statement of their child table.
    let mut foreign_keys: HashMap<&str, Vec<&ForeignKeySpec>> = HashMap::new();
    for change in changes {
        if let SchemaChange::AddForeignKey(fk) = change {
            foreign_keys.entry(&fk.from_table).or_default().push(fk);
        }
    }

    let mut statements = Vec::with_capacity(changes.len());
    for change in changes {
        match change {
            SchemaChange::CreateTable(table) => {
                let fks = foreign_keys
                    .get(table.name.as_str())
                    .map_or(&[][..], |v| v.as_slice());
                statements.push(Statement::bare(render_create_table(table.name.as_str(), &table.columns, fks)));
            }
            SchemaChange::AddForeignKey(fk) => {
                // Consumed by the child's CREATE statement above. A constraint
                // whose child table is absent from this list is a plan that
                // bypassed build-time validation.
                if !changes.iter().any(|c| {
                    matches!(c, SchemaChange::CreateTable(t) if t.name == fk.from_table)
                }) {
                    return Err(Error::SchemaChangeRejected(format!(
                        "foreign key '{}': table '{}' is not created in this change list",
                        fk.constraint, fk.from_table
                    )));
                }
            }
            SchemaChange::AddColumn { table, column } => {
                statements.push(Statement::bare(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote_identifier(table),
                    render_column(column)
                )));
            }
            SchemaChange::InsertRow { table, values } => {
                let columns = values
                    .iter()
                    .map(|(name, _)| quote_identifier(name))
                    .collect::<Vec<_>>()
                    .join(", ");
                let placeholders = (1..=values.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                statements.push(Statement {
                    sql: format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        quote_identifier(table),
                        columns,
                        placeholders
                    ),
                    params: values.iter().map(|(_, v)| sql_value(v)).collect(),
                });
            }
            SchemaChange::DeleteRows { table, column, value } => {
                statements.push(Statement {
                    sql: format!(
                        "DELETE FROM {} WHERE {} = ?1",
                        quote_identifier(table),
                        quote_identifier(column)
                    ),
                    params: vec![sql_value(value)],
                });
            }
            SchemaChange::DropTable { name } => {
                statements.push(Statement::bare(format!(
                    "DROP TABLE {}",
                    quote_identifier(name)
                )));
            }
        }
    }

    Ok(statements)
}

fn render_create_table(name: &str, columns: &[ColumnSpec], fks: &[&ForeignKeySpec]) -> String {
    let mut clauses: Vec<String> = columns.iter().map(render_column).collect();

    let pk_columns: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quote_identifier(&c.name))
        .collect();
    if !pk_columns.is_empty() {
        clauses.push(format!("PRIMARY KEY ({})", pk_columns.join(", ")));
    }

    for fk in fks {
        clauses.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_identifier(&fk.constraint),
            quote_identifier(&fk.from_column),
            quote_identifier(&fk.to_table),
            quote_identifier(&fk.to_column)
        ));
    }

    format!("CREATE TABLE {} ({})", quote_identifier(name), clauses.join(", "))
}

fn render_column(column: &ColumnSpec) -> String {
    let mut sql = format!(
        "{} {}",
        quote_identifier(&column.name),
        column_type_sql(column.column_type)
    );
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&render_default(default));
    }
    sql
}

fn column_type_sql(column_type: ColumnType) -> String {
    match column_type {
        ColumnType::Guid => "TEXT".to_string(),
        ColumnType::String(length) => format!("VARCHAR({length})"),
        ColumnType::Text => "TEXT".to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Integer => "INTEGER".to_string(),
        ColumnType::BigInteger => "BIGINT".to_string(),
        ColumnType::DateTime => "DATETIME".to_string(),
        ColumnType::Binary => "BLOB".to_string(),
    }
}

// Defaults are part of DDL text; SQLite does not bind parameters there.
fn render_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::CurrentUtcTimestamp => "CURRENT_TIMESTAMP".to_string(),
        DefaultValue::Literal(value) => render_literal(value),
    }
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::Guid(guid) => format!("'{}'", guid),
        Value::Text(text) => format!("'{}'", text.replace('\'', "''")),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Timestamp(ts) => format!("'{}'", ts.to_rfc3339()),
        Value::Null => "NULL".to_string(),
    }
}

fn sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Guid(guid) => rusqlite::types::Value::Text(guid.to_string()),
        Value::Text(text) => rusqlite::types::Value::Text(text.clone()),
        Value::Bool(b) => rusqlite::types::Value::Integer(*b as i64),
        Value::Int(n) => rusqlite::types::Value::Integer(*n),
        Value::Timestamp(ts) => rusqlite::types::Value::Text(ts.to_rfc3339()),
        Value::Null => rusqlite::types::Value::Null,
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}
