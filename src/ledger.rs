use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};

use crate::error::Error;
use crate::identity::MigrationIdentity;

pub(crate) const DEFAULT_LEDGER_TABLE_NAME: &str = "_stratum_ledger_";

/// One persisted record of an applied migration: the sole source of truth
/// for "what has run."
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub identity: MigrationIdentity,
    pub name: String,
    pub applied_at: DateTime<Utc>,
    pub checksum: String,
}

/// Access to the ledger table. All writes go through the transaction of the
/// unit they belong to, so an entry exists exactly when the unit's changes
/// are committed.
#[derive(Debug, Clone)]
pub(crate) struct Ledger {
    table_name: String,
}

impl Ledger {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn table_exists(&self, conn: &Connection) -> Result<bool, Error> {
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
        let exists = stmt.query([&self.table_name])?.next()?.is_some();
        Ok(exists)
    }

    /// Create the ledger table if absent. Returns whether it already existed.
    pub fn ensure_table(&self, conn: &Connection) -> Result<bool, Error> {
        let existed = self.table_exists(conn)?;
        if !existed {
            // IF NOT EXISTS handles concurrent creation attempts
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (identity integer primary key not null, name text not null, applied_at text not null, checksum text not null)",
                    self.table_name
                ),
                [],
            )?;
        }
        Ok(existed)
    }

    pub fn applied_identities(
        &self,
        conn: &Connection,
    ) -> Result<BTreeSet<MigrationIdentity>, Error> {
        if !self.table_exists(conn)? {
            return Ok(BTreeSet::new());
        }
        let mut stmt = conn.prepare(&format!("SELECT identity FROM {}", self.table_name))?;
        let raw: Vec<i64> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|value| MigrationIdentity::new(value as u64))
            .collect()
    }

    /// All entries, ascending by identity.
    pub fn entries(&self, conn: &Connection) -> Result<Vec<LedgerEntry>, Error> {
        if !self.table_exists(conn)? {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT identity, name, applied_at, checksum FROM {} ORDER BY identity",
            self.table_name
        ))?;
        let rows: Vec<(i64, String, String, String)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(raw_identity, name, applied_at_str, checksum)| {
                let identity = MigrationIdentity::new(raw_identity as u64)?;
                let applied_at = DateTime::parse_from_rfc3339(&applied_at_str)
                    .map_err(|e| {
                        Error::Generic(format!(
                            "ledger entry {identity} has unparseable applied_at '{applied_at_str}': {e}"
                        ))
                    })?
                    .with_timezone(&Utc);
                Ok(LedgerEntry {
                    identity,
                    name,
                    applied_at,
                    checksum,
                })
            })
            .collect()
    }

    /// Record an applied unit within its transaction.
    pub fn record(
        &self,
        tx: &Transaction,
        identity: MigrationIdentity,
        name: &str,
        applied_at: &str,
        checksum: &str,
    ) -> Result<(), Error> {
        tx.execute(
            &format!(
                "INSERT INTO {} (identity, name, applied_at, checksum) VALUES(?1, ?2, ?3, ?4)",
                self.table_name
            ),
            params![identity.as_u64() as i64, name, applied_at, checksum],
        )?;
        Ok(())
    }

    /// Remove a reversed unit's entry within its transaction.
    pub fn remove(&self, tx: &Transaction, identity: MigrationIdentity) -> Result<(), Error> {
        tx.execute(
            &format!("DELETE FROM {} WHERE identity = ?1", self.table_name),
            params![identity.as_u64() as i64],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_and_conn() -> (Ledger, Connection) {
        (
            Ledger::new(DEFAULT_LEDGER_TABLE_NAME),
            Connection::open_in_memory().unwrap(),
        )
    }

    #[test]
    fn missing_table_reads_as_empty() {
        let (ledger, conn) = ledger_and_conn();
        assert!(!ledger.table_exists(&conn).unwrap());
        assert!(ledger.applied_identities(&conn).unwrap().is_empty());
        assert!(ledger.entries(&conn).unwrap().is_empty());
    }

    #[test]
    fn record_and_remove_round_trip() {
        let (ledger, mut conn) = ledger_and_conn();
        assert!(!ledger.ensure_table(&conn).unwrap());
        let identity = MigrationIdentity::new(202609272116).unwrap();

        let tx = conn.transaction().unwrap();
        ledger
            .record(&tx, identity, "create users", &Utc::now().to_rfc3339(), "abc123")
            .unwrap();
        tx.commit().unwrap();

        let applied = ledger.applied_identities(&conn).unwrap();
        assert!(applied.contains(&identity));

        let entries = ledger.entries(&conn).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identity, identity);
        assert_eq!(entries[0].name, "create users");
        assert_eq!(entries[0].checksum, "abc123");

        let tx = conn.transaction().unwrap();
        ledger.remove(&tx, identity).unwrap();
        tx.commit().unwrap();
        assert!(ledger.applied_identities(&conn).unwrap().is_empty());
    }

    #[test]
    fn entries_are_ascending_by_identity() {
        let (ledger, mut conn) = ledger_and_conn();
        ledger.ensure_table(&conn).unwrap();
        let now = Utc::now().to_rfc3339();

        let tx = conn.transaction().unwrap();
        for raw in [202603010000u64, 202601010000, 202602010000] {
            let identity = MigrationIdentity::new(raw).unwrap();
            ledger.record(&tx, identity, "m", &now, "c").unwrap();
        }
        tx.commit().unwrap();

        let identities: Vec<u64> = ledger
            .entries(&conn)
            .unwrap()
            .iter()
            .map(|e| e.identity.as_u64())
            .collect();
        assert_eq!(identities, vec![202601010000, 202602010000, 202603010000]);
    }
}
