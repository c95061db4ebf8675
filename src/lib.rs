#![cfg_attr(docsrs, feature(doc_cfg))]
//! `stratum` is a code-first schema-migration engine for SQLite.
//!
//! Core concepts:
//! - Migrations are **units**: immutable descriptions of one schema change
//!   with a strictly ordered identity (a 12-digit year-month-day-hour-minute
//!   encoding such as `202609272116`), a forward action, and a reverse
//!   action.
//! - A **registry** validates identities at registration and yields a
//!   deterministic ascending sequence.
//! - A **ledger** table persists which identities have been applied; pending
//!   work is the set difference between the two.
//! - A **runner** applies or reverses units one transaction at a time,
//!   writing the ledger inside each unit's transaction, aborting on the
//!   first failure and leaving prior commits standing.
//!
//! Forward and reverse actions receive a [MigrationContext] carrying the
//! unit's transaction explicitly. Through it they can apply a [SchemaPlan] —
//! a fluent, pure-data builder for tables, columns, foreign keys, and seed
//! rows that is validated before any statement is issued — run an embedded
//! script registered in a [ScriptRegistry], or use the live transaction for
//! arbitrary logic: querying data out, transforming it in Rust, and writing
//! it back.
//!
//! # Example
//!
//! ```
//! use stratum::{Error, Migration, MigrationContext, MigrationRegistry, Runner, SchemaPlan};
//! use rusqlite::Connection;
//!
//! struct CreateRoles;
//! impl Migration for CreateRoles {
//!     fn identity(&self) -> u64 {
//!         202609272116
//!     }
//!     fn name(&self) -> String {
//!         "create roles table".to_string()
//!     }
//!     fn up(&self, ctx: &MigrationContext<'_>) -> Result<(), Error> {
//!         ctx.apply(
//!             SchemaPlan::new()
//!                 .create_table("roles")
//!                 .with_column("id").as_guid().primary_key().not_nullable()
//!                 .with_column("rolename").as_string(50).not_nullable()
//!                 .with_column("created_at").as_datetime().not_nullable()
//!                 .with_default_current_utc_timestamp(),
//!         )
//!     }
//!     fn down(&self, ctx: &MigrationContext<'_>) -> Result<(), Error> {
//!         ctx.apply(SchemaPlan::new().declare_existing_table("roles").drop_table("roles"))
//!     }
//! }
//!
//! let registry = MigrationRegistry::try_new(vec![Box::new(CreateRoles)]).unwrap();
//! let runner = Runner::new(registry);
//!
//! let mut conn = Connection::open_in_memory().unwrap();
//! let report = runner.apply(&mut conn).unwrap();
//! assert_eq!(report.units_run.len(), 1);
//! assert!(report.failure.is_none());
//!
//! // applying again is a no-op: the ledger already records the identity
//! let report = runner.apply(&mut conn).unwrap();
//! assert!(report.units_run.is_empty());
//! ```
//!
//! # Feature flags
//!
//! - `cli` - clap-based argument shape and dispatch for host binaries.
//! - `testing` - an in-memory test harness with schema assertions.
//! - `tracing` - structured spans and events via the `tracing` crate.

mod context;
pub use context::MigrationContext;

mod error;
pub use error::Error;

mod identity;
pub use identity::MigrationIdentity;

mod ledger;
pub use ledger::LedgerEntry;

mod migration;
pub use migration::{Direction, Migration};

mod registry;
pub use registry::MigrationRegistry;

mod render;

mod runner;
pub use runner::{RunReport, Runner, UnitFailure};

mod schema;
pub use schema::{
    ColumnSpec, ColumnType, DefaultValue, ForeignKeySpec, SchemaChange, SchemaPlan, TableSpec,
    Value,
};

mod scripts;
pub use scripts::ScriptRegistry;

#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod cli;

#[cfg(feature = "testing")]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;
