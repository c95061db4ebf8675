//!
//! # Example
//!
//! ```
//! use stratum::{Error, Migration, MigrationContext, MigrationRegistry, Runner, SchemaPlan};
//! use rusqlite::Connection;
//!
//! struct CreateUsers;
//! impl Migration for CreateUsers {
//!     fn identity(&self) -> u64 {
//!         202601151200
//!     }
//!     fn up(&self, ctx: &MigrationContext<'_>) -> Result<(), Error> {
//!         ctx.apply(
//!             SchemaPlan::new()
//!                 .create_table("users")
//!                 .with_column("id").as_guid().primary_key().not_nullable()
//!                 .with_column("username").as_string(50).not_nullable(),
//!         )
//!     }
//!     fn down(&self, ctx: &MigrationContext<'_>) -> Result<(), Error> {
//!         ctx.apply(SchemaPlan::new().declare_existing_table("users").drop_table("users"))
//!     }
//! }
//!
//! let registry = MigrationRegistry::try_new(vec![Box::new(CreateUsers)]).unwrap();
//! let runner = Runner::new(registry);
//!
//! let mut conn = Connection::open_in_memory().unwrap();
//! let report = runner.apply(&mut conn).unwrap();
//! assert_eq!(report.units_run.len(), 1);
//! assert!(report.failure.is_none());
//!
//! let report = runner.rollback(&mut conn, 1).unwrap();
//! assert_eq!(report.units_run.len(), 1);
//! ```

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::context::MigrationContext;
use crate::error::Error;
use crate::identity::MigrationIdentity;
use crate::ledger::{Ledger, LedgerEntry, DEFAULT_LEDGER_TABLE_NAME};
use crate::migration::{Direction, Migration};
use crate::registry::MigrationRegistry;
use crate::scripts::ScriptRegistry;

/// A failed unit: the identity, direction, and underlying cause.
#[derive(Debug, PartialEq)]
pub struct UnitFailure {
    pub(crate) identity: MigrationIdentity,
    pub(crate) name: String,
    pub(crate) direction: Direction,
    pub(crate) error: Error,
}

impl UnitFailure {
    pub fn identity(&self) -> MigrationIdentity {
        self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Wrap this failure as [Error::MigrationFailed].
    pub fn into_error(self) -> Error {
        Error::MigrationFailed {
            identity: self.identity,
            direction: self.direction,
            cause: Box::new(self.error),
        }
    }
}

/// A report of actions performed during an apply or rollback run.
///
/// A failed unit does not make the whole run an `Err` — prior units in the
/// run were committed and remain applied, which `units_run` records. Use
/// [RunReport::into_result] when a failure should become a hard error.
#[derive(Debug, PartialEq)]
pub struct RunReport {
    pub ledger_existed: bool,
    pub ledger_created: bool,
    pub units_run: Vec<MigrationIdentity>,
    pub failure: Option<UnitFailure>,
}

impl RunReport {
    /// The identities committed this run, or [Error::MigrationFailed] for
    /// the unit that aborted it.
    pub fn into_result(self) -> Result<Vec<MigrationIdentity>, Error> {
        match self.failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(self.units_run),
        }
    }
}

/// Orchestrates apply and rollback across the registry's ordered sequence:
/// one transaction per unit, ledger writes inside that transaction, abort on
/// first failure with prior commits left standing.
pub struct Runner {
    registry: MigrationRegistry,
    scripts: ScriptRegistry,
    ledger: Ledger,
    busy_timeout: Duration,
    on_unit_start: Option<Box<dyn Fn(MigrationIdentity, &str) + Send + Sync>>,
    on_unit_complete: Option<Box<dyn Fn(MigrationIdentity, &str, Duration) + Send + Sync>>,
    on_unit_error: Option<Box<dyn Fn(MigrationIdentity, &str, &Error) + Send + Sync>>,
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("registry", &self.registry)
            .field("ledger_table_name", &self.ledger.table_name())
            .field("busy_timeout", &self.busy_timeout)
            .field("on_unit_start", &self.on_unit_start.is_some())
            .field("on_unit_complete", &self.on_unit_complete.is_some())
            .field("on_unit_error", &self.on_unit_error.is_some())
            .finish()
    }
}

impl Runner {
    pub fn new(registry: MigrationRegistry) -> Self {
        Self {
            registry,
            scripts: ScriptRegistry::new(),
            ledger: Ledger::new(DEFAULT_LEDGER_TABLE_NAME),
            busy_timeout: Duration::from_secs(30),
            on_unit_start: None,
            on_unit_complete: None,
            on_unit_error: None,
        }
    }

    /// Supply the embedded script registry consulted by
    /// [MigrationContext::run_embedded_script].
    pub fn with_scripts(mut self, scripts: ScriptRegistry) -> Self {
        self.scripts = scripts;
        self
    }

    /// Set a custom name for the ledger table.
    /// Defaults to "_stratum_ledger_".
    pub fn with_ledger_table_name(mut self, name: impl Into<String>) -> Self {
        self.ledger = Ledger::new(name);
        self
    }

    /// Set the busy timeout for database operations. This controls how long
    /// a concurrent runner instance waits for locks instead of failing
    /// immediately. Defaults to 30 seconds.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set a callback invoked when a unit starts, with its identity and name.
    pub fn on_unit_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(MigrationIdentity, &str) + Send + Sync + 'static,
    {
        self.on_unit_start = Some(Box::new(callback));
        self
    }

    /// Set a callback invoked when a unit commits, with its identity, name,
    /// and duration.
    pub fn on_unit_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(MigrationIdentity, &str, Duration) + Send + Sync + 'static,
    {
        self.on_unit_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback invoked when a unit fails, with its identity, name,
    /// and error.
    pub fn on_unit_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(MigrationIdentity, &str, &Error) + Send + Sync + 'static,
    {
        self.on_unit_error = Some(Box::new(callback));
        self
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    /// Prepare a connection for a run: wait on locks instead of failing
    /// immediately, and enforce declared foreign keys.
    fn setup_connection(&self, conn: &Connection) -> Result<(), Error> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(())
    }

    /// Checksum a unit from its identity and name, used to verify that units
    /// haven't been modified after being applied.
    pub(crate) fn unit_checksum(identity: MigrationIdentity, name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(identity.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(name.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Validate every ledger entry against the registry before any
    /// transaction opens: each applied identity must have a registered unit
    /// whose checksum matches its entry.
    fn verify_ledger(&self, conn: &Connection) -> Result<(), Error> {
        for entry in self.ledger.entries(conn)? {
            let unit = self
                .registry
                .get(entry.identity)
                .ok_or(Error::UnknownIdentity(entry.identity))?;
            let actual = Self::unit_checksum(entry.identity, &unit.name());
            if actual != entry.checksum {
                return Err(Error::ChecksumMismatch {
                    identity: entry.identity,
                    recorded: entry.checksum,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// The identities currently recorded as applied.
    pub fn applied_identities(
        &self,
        conn: &mut Connection,
    ) -> Result<BTreeSet<MigrationIdentity>, Error> {
        self.ledger.applied_identities(conn)
    }

    /// The highest applied identity, if any.
    pub fn current_identity(&self, conn: &mut Connection) -> Result<Option<MigrationIdentity>, Error> {
        Ok(self.ledger.applied_identities(conn)?.into_iter().next_back())
    }

    /// The full ledger, ascending by identity.
    pub fn history(&self, conn: &mut Connection) -> Result<Vec<LedgerEntry>, Error> {
        self.ledger.entries(conn)
    }

    /// Preview which units `apply` would run, in order, without running them.
    pub fn preview_apply(
        &self,
        conn: &mut Connection,
    ) -> Result<Vec<(MigrationIdentity, &dyn Migration)>, Error> {
        let applied = self.ledger.applied_identities(conn)?;
        Ok(self.registry.pending(&applied))
    }

    /// Preview which units `rollback(count)` would reverse, in the order
    /// they would run (descending identity).
    pub fn preview_rollback(
        &self,
        conn: &mut Connection,
        count: usize,
    ) -> Result<Vec<(MigrationIdentity, &dyn Migration)>, Error> {
        let mut entries = self.ledger.entries(conn)?;
        entries.reverse();
        entries
            .into_iter()
            .take(count)
            .map(|entry| {
                self.registry
                    .get(entry.identity)
                    .map(|unit| (entry.identity, unit))
                    .ok_or(Error::UnknownIdentity(entry.identity))
            })
            .collect()
    }

    /// Apply all pending units in ascending identity order.
    pub fn apply(&self, conn: &mut Connection) -> Result<RunReport, Error> {
        self.apply_internal(conn, None)
    }

    /// Apply pending units up to and including the target identity. Fails
    /// with [Error::InvalidTarget] if the identity is not registered.
    pub fn apply_to(
        &self,
        conn: &mut Connection,
        target: MigrationIdentity,
    ) -> Result<RunReport, Error> {
        if !self.registry.contains(target) {
            return Err(Error::InvalidTarget(format!(
                "target identity {target} does not exist in the registry"
            )));
        }
        self.apply_internal(conn, Some(target))
    }

    fn apply_internal(
        &self,
        conn: &mut Connection,
        target: Option<MigrationIdentity>,
    ) -> Result<RunReport, Error> {
        self.setup_connection(conn)?;

        let ledger_existed = self.ledger.ensure_table(conn)?;
        self.verify_ledger(conn)?;
        let applied = self.ledger.applied_identities(conn)?;

        // All units in one run share an applied_at timestamp.
        let batch_applied_at = Utc::now().to_rfc3339();

        let mut units_run: Vec<MigrationIdentity> = Vec::new();
        let mut failure: Option<UnitFailure> = None;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            applied = applied.len(),
            registered = self.registry.len(),
            target_identity = ?target.map(|t| t.as_u64()),
            "Considering units to apply"
        );

        for (identity, unit) in self.registry.ordered_units() {
            let identity = *identity;
            if let Some(target) = target {
                if identity > target {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        identity = identity.as_u64(),
                        target_identity = target.as_u64(),
                        "Skipping unit (beyond target identity)"
                    );
                    break;
                }
            }
            if applied.contains(&identity) {
                #[cfg(feature = "tracing")]
                tracing::debug!(identity = identity.as_u64(), "Skipping unit (already applied)");
                continue;
            }

            let name = unit.name();

            #[cfg(feature = "tracing")]
            let _span =
                tracing::info_span!("unit_up", identity = identity.as_u64(), name = %name)
                    .entered();

            #[cfg(feature = "tracing")]
            tracing::info!("Applying unit");

            if let Some(ref callback) = self.on_unit_start {
                callback(identity, &name);
            }

            let unit_start = Instant::now();

            // Scoped transaction: dropped without commit on every failure
            // path, which rolls the unit's changes back.
            let unit_result = {
                let tx = conn.transaction()?;
                let ctx = MigrationContext::new(&tx, &self.scripts);
                match unit.up(&ctx) {
                    Ok(()) => {
                        let checksum = Self::unit_checksum(identity, &name);
                        self.ledger
                            .record(&tx, identity, &name, &batch_applied_at, &checksum)?;
                        tx.commit()?;
                        Ok(())
                    }
                    Err(error) => Err(error),
                }
            };

            match unit_result {
                Ok(()) => {
                    let unit_duration = unit_start.elapsed();

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        duration_ms = unit_duration.as_millis(),
                        "Unit applied successfully"
                    );

                    units_run.push(identity);

                    if let Some(ref callback) = self.on_unit_complete {
                        callback(identity, &name, unit_duration);
                    }
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %error, "Unit failed; aborting run");

                    if let Some(ref callback) = self.on_unit_error {
                        callback(identity, &name, &error);
                    }

                    failure = Some(UnitFailure {
                        identity,
                        name,
                        direction: Direction::Up,
                        error,
                    });
                    break;
                }
            }
        }

        Ok(RunReport {
            ledger_existed,
            ledger_created: !ledger_existed,
            units_run,
            failure,
        })
    }

    /// Reverse the most-recently-applied `count` units in descending
    /// identity order. A count exceeding the number of applied units
    /// reverses everything that is applied.
    pub fn rollback(&self, conn: &mut Connection, count: usize) -> Result<RunReport, Error> {
        self.setup_connection(conn)?;

        if !self.ledger.table_exists(conn)? {
            // Nothing has ever been applied.
            return Ok(RunReport {
                ledger_existed: false,
                ledger_created: false,
                units_run: vec![],
                failure: None,
            });
        }

        self.verify_ledger(conn)?;

        let mut entries = self.ledger.entries(conn)?;
        entries.reverse();
        let targets: Vec<LedgerEntry> = entries.into_iter().take(count).collect();

        let mut units_run: Vec<MigrationIdentity> = Vec::new();
        let mut failure: Option<UnitFailure> = None;

        for entry in targets {
            let identity = entry.identity;
            // verified above, so the unit is present
            let unit = self
                .registry
                .get(identity)
                .ok_or(Error::UnknownIdentity(identity))?;
            let name = unit.name();

            #[cfg(feature = "tracing")]
            let _span =
                tracing::info_span!("unit_down", identity = identity.as_u64(), name = %name)
                    .entered();

            #[cfg(feature = "tracing")]
            tracing::info!("Reversing unit");

            if let Some(ref callback) = self.on_unit_start {
                callback(identity, &name);
            }

            let unit_start = Instant::now();

            let unit_result = {
                let tx = conn.transaction()?;
                let ctx = MigrationContext::new(&tx, &self.scripts);
                match unit.down(&ctx) {
                    Ok(()) => {
                        self.ledger.remove(&tx, identity)?;
                        tx.commit()?;
                        Ok(())
                    }
                    Err(error) => Err(error),
                }
            };

            match unit_result {
                Ok(()) => {
                    let unit_duration = unit_start.elapsed();

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        duration_ms = unit_duration.as_millis(),
                        "Unit reversed successfully"
                    );

                    units_run.push(identity);

                    if let Some(ref callback) = self.on_unit_complete {
                        callback(identity, &name, unit_duration);
                    }
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %error, "Unit rollback failed; aborting run");

                    if let Some(ref callback) = self.on_unit_error {
                        callback(identity, &name, &error);
                    }

                    failure = Some(UnitFailure {
                        identity,
                        name,
                        direction: Direction::Down,
                        error,
                    });
                    break;
                }
            }
        }

        Ok(RunReport {
            ledger_existed: true,
            ledger_created: false,
            units_run,
            failure,
        })
    }
}
