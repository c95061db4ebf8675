use rusqlite::Transaction;

use crate::error::Error;
use crate::render::render_changes;
use crate::schema::{SchemaChange, SchemaPlan};
use crate::scripts::ScriptRegistry;

/// The execution surface handed to a unit's forward and reverse actions.
///
/// The context carries the unit's transaction explicitly — there is no
/// ambient transaction state — and every operation it offers runs against
/// that transaction: applying a built [SchemaPlan], executing an embedded
/// script, or issuing direct statements for logic the declarative builder
/// does not cover (querying data out, transforming it in Rust, and writing
/// it back).
pub struct MigrationContext<'a> {
    tx: &'a Transaction<'a>,
    scripts: &'a ScriptRegistry,
}

impl<'a> MigrationContext<'a> {
    pub(crate) fn new(tx: &'a Transaction<'a>, scripts: &'a ScriptRegistry) -> Self {
        Self { tx, scripts }
    }

    /// Build the plan and execute its changes one statement at a time, in
    /// declaration order, within the unit's transaction.
    pub fn apply(&self, plan: SchemaPlan) -> Result<(), Error> {
        let changes = plan.build()?;
        self.apply_changes(&changes)
    }

    /// Execute an already-built change list.
    pub fn apply_changes(&self, changes: &[SchemaChange]) -> Result<(), Error> {
        for statement in render_changes(changes)? {
            self.tx.execute(
                &statement.sql,
                rusqlite::params_from_iter(statement.params.iter()),
            )?;
        }
        Ok(())
    }

    /// Resolve a named embedded script and execute its text verbatim within
    /// the transaction. The text may contain multiple statements.
    pub fn run_embedded_script(&self, name: &str) -> Result<(), Error> {
        let sql = self.scripts.resolve(name)?;
        self.tx
            .execute_batch(sql)
            .map_err(|source| Error::ScriptExecutionFailed {
                name: name.to_string(),
                source,
            })
    }

    /// Execute a single raw statement, returning the number of affected rows.
    pub fn execute(&self, sql: &str) -> Result<usize, Error> {
        Ok(self.tx.execute(sql, [])?)
    }

    /// The unit's transaction, for migration logic that needs the full
    /// database surface (queries, prepared statements, batch updates).
    pub fn transaction(&self) -> &'a Transaction<'a> {
        self.tx
    }
}
