use std::fmt;

use crate::context::MigrationContext;
use crate::error::Error;

/// The direction a unit is being run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A trait that must be implemented to define a migration unit: an immutable
/// description of one schema change with an identity, a forward action, and
/// a reverse action.
///
/// The `identity` value is a 12-digit year-month-day-hour-minute encoding
/// (e.g. `202609272116`) validated at registration; it must be unique across
/// all units supplied to a [MigrationRegistry](crate::MigrationRegistry), and
/// its ordering defines apply order.
///
/// # IMPORTANT WARNING
///
/// **Once a unit has been applied to any database, its identity and name
/// must NEVER change.** They are recorded in the ledger (the name feeds the
/// integrity checksum); changing either makes the runner refuse to proceed.
/// The description may change freely.
pub trait Migration {
    /// The raw identity of this unit.
    fn identity(&self) -> u64;

    /// Human-readable name, recorded in the ledger.
    fn name(&self) -> String {
        format!("Migration {}", self.identity())
    }

    /// Optional documentation; never recorded or validated.
    fn description(&self) -> Option<&'static str> {
        None
    }

    /// The forward action. Issue schema plans, embedded scripts, or direct
    /// statements through the supplied context; everything runs inside the
    /// unit's transaction.
    fn up(&self, ctx: &MigrationContext<'_>) -> Result<(), Error>;

    /// The reverse action. The default implementation is a deliberate no-op:
    /// it always succeeds and leaves the forward side effects in place. This
    /// is the supported escape hatch for irreversible migrations — the
    /// runner does not distinguish "did nothing" from "nothing to undo",
    /// and still removes the ledger entry on success.
    fn down(&self, _ctx: &MigrationContext<'_>) -> Result<(), Error> {
        Ok(())
    }
}

impl PartialEq for dyn Migration {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("identity", &self.identity())
            .field("name", &self.name())
            .finish()
    }
}
