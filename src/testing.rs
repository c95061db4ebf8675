//! Testing utilities for migration development and verification.
//!
//! Provides a harness for writing migration tests against an in-memory
//! database: state control (apply to a point, roll back), query helpers, and
//! schema assertions.

use std::collections::HashMap;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::identity::MigrationIdentity;
use crate::runner::Runner;

/// A test harness pairing a [Runner] with an in-memory connection.
///
/// Construct it with the same runner the production code uses — as the
/// migration list grows, assertions about earlier units should keep passing
/// unchanged.
pub struct RunnerTestHarness {
    conn: Connection,
    runner: Runner,
}

/// A captured database schema for comparison and snapshotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Map of table name to table definition.
    pub tables: HashMap<String, TableSchema>,
}

/// A captured table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// The SQL CREATE statement for the table.
    pub sql: String,
    pub columns: Vec<ColumnInfo>,
}

/// Information about a column, as reported by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

impl RunnerTestHarness {
    /// Create a harness over an in-memory SQLite database.
    pub fn new(runner: Runner) -> Self {
        let conn = Connection::open_in_memory().expect("Failed to create in-memory test database");
        Self { conn, runner }
    }

    /// Create a harness with a custom connection, e.g. a file-based database.
    pub fn with_connection(conn: Connection, runner: Runner) -> Self {
        Self { conn, runner }
    }

    /// Apply all pending units, converting a failed unit into an error.
    pub fn apply_all(&mut self) -> Result<Vec<MigrationIdentity>, Error> {
        self.runner.apply(&mut self.conn)?.into_result()
    }

    /// Apply pending units up to and including the target identity.
    pub fn apply_to(&mut self, target: MigrationIdentity) -> Result<Vec<MigrationIdentity>, Error> {
        self.runner.apply_to(&mut self.conn, target)?.into_result()
    }

    /// Reverse the most recent `count` units.
    pub fn rollback(&mut self, count: usize) -> Result<Vec<MigrationIdentity>, Error> {
        self.runner.rollback(&mut self.conn, count)?.into_result()
    }

    /// The highest applied identity, if any.
    pub fn current_identity(&mut self) -> Result<Option<MigrationIdentity>, Error> {
        self.runner.current_identity(&mut self.conn)
    }

    /// Execute a SQL statement (for setting up test data).
    pub fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.conn.execute(sql, [])?;
        Ok(())
    }

    /// Query a single value.
    pub fn query_one<T>(&mut self, sql: &str) -> Result<T, Error>
    where
        T: rusqlite::types::FromSql,
    {
        let result = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(result)
    }

    /// Query all values of a single-column result.
    pub fn query_all<T>(&mut self, sql: &str) -> Result<Vec<T>, Error>
    where
        T: rusqlite::types::FromSql,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let results = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<T>, _>>()?;
        Ok(results)
    }

    /// Query with a custom row mapper.
    pub fn query_map<T, F>(&mut self, sql: &str, f: F) -> Result<Vec<T>, Error>
    where
        F: FnMut(&Row) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let results = stmt.query_map([], f)?.collect::<Result<Vec<T>, _>>()?;
        Ok(results)
    }

    fn table_count(&mut self, table_name: &str) -> Result<i64, Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Assert that a table exists.
    pub fn assert_table_exists(&mut self, table_name: &str) -> Result<(), Error> {
        if self.table_count(table_name)? == 0 {
            return Err(Error::Generic(format!("Table '{table_name}' does not exist")));
        }
        Ok(())
    }

    /// Assert that a table does not exist.
    pub fn assert_table_not_exists(&mut self, table_name: &str) -> Result<(), Error> {
        if self.table_count(table_name)? > 0 {
            return Err(Error::Generic(format!(
                "Table '{table_name}' exists but should not"
            )));
        }
        Ok(())
    }

    /// Assert that a column exists in a table.
    pub fn assert_column_exists(&mut self, table_name: &str, column_name: &str) -> Result<(), Error> {
        let columns = self.get_columns(table_name)?;
        if !columns.iter().any(|c| c.name == column_name) {
            return Err(Error::Generic(format!(
                "Column '{column_name}' does not exist in table '{table_name}'"
            )));
        }
        Ok(())
    }

    /// The columns of a table, as reported by `PRAGMA table_info`.
    pub fn get_columns(&mut self, table_name: &str) -> Result<Vec<ColumnInfo>, Error> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{table_name}\")"))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    type_name: row.get(2)?,
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Capture the current schema (user tables only) as a snapshot.
    pub fn capture_schema(&mut self) -> Result<SchemaSnapshot, Error> {
        let ledger_table = "_stratum_ledger_";
        let table_names: Vec<String> = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != ?1",
            )?
            .query_map([ledger_table], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = HashMap::new();
        for table_name in table_names {
            let sql: String = self.conn.query_row(
                "SELECT sql FROM sqlite_master WHERE type='table' AND name=?1",
                [&table_name],
                |row| row.get(0),
            )?;
            // Normalize quoting so hand-written and rendered DDL compare equal
            let normalized_sql = sql.replace('"', "");
            let columns = self.get_columns(&table_name)?;
            tables.insert(
                table_name,
                TableSchema {
                    sql: normalized_sql,
                    columns,
                },
            );
        }

        Ok(SchemaSnapshot { tables })
    }
}
