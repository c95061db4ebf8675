use crate::identity::MigrationIdentity;
use crate::migration::Direction;

/// Error type for the stratum crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A migration unit declared an identity that does not parse as a
    /// 12-digit year-month-day-hour-minute value.
    #[error("malformed migration identity '{value}': {reason}")]
    MalformedIdentity { value: String, reason: String },

    /// Two migration units declared the same identity.
    #[error("duplicate migration identity {0}")]
    DuplicateIdentity(MigrationIdentity),

    /// A unit was registered after the registry's ordering had been read.
    #[error("registry is sealed; no units may be registered after the ordered sequence has been read")]
    RegistrySealed,

    /// A schema plan failed build-time validation.
    #[error("schema change rejected: {0}")]
    SchemaChangeRejected(String),

    /// An embedded script name did not resolve.
    #[error("embedded script '{0}' not found")]
    ScriptNotFound(String),

    /// An embedded script resolved but failed to execute.
    #[error("embedded script '{name}' failed: {source}")]
    ScriptExecutionFailed {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A unit's forward or reverse action failed; the unit's transaction was
    /// rolled back and the run aborted.
    #[error("migration {identity} failed during {direction}: {cause}")]
    MigrationFailed {
        identity: MigrationIdentity,
        direction: Direction,
        #[source]
        cause: Box<Error>,
    },

    /// The ledger records an identity with no registered unit.
    #[error("identity {0} is recorded in the ledger but has no registered migration unit; applied units cannot be removed from the registry")]
    UnknownIdentity(MigrationIdentity),

    /// A ledger entry's checksum no longer matches its registered unit,
    /// meaning the unit was modified after being applied.
    #[error("migration {identity} checksum mismatch: ledger has '{recorded}' but the registered unit hashes to '{actual}'; units must not change once applied")]
    ChecksumMismatch {
        identity: MigrationIdentity,
        recorded: String,
        actual: String,
    },

    /// An apply/rollback target was invalid (e.g. an identity not present in
    /// the registry).
    #[error("{0}")]
    InvalidTarget(String),

    #[error("{0}")]
    Sql(#[from] rusqlite::Error),

    #[error("{0}")]
    Generic(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

// Manual PartialEq so reports containing errors can be compared in tests.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::MalformedIdentity { value: a, reason: ar },
                Self::MalformedIdentity { value: b, reason: br },
            ) => a == b && ar == br,
            (Self::DuplicateIdentity(a), Self::DuplicateIdentity(b)) => a == b,
            (Self::RegistrySealed, Self::RegistrySealed) => true,
            (Self::SchemaChangeRejected(a), Self::SchemaChangeRejected(b)) => a == b,
            (Self::ScriptNotFound(a), Self::ScriptNotFound(b)) => a == b,
            (
                Self::ScriptExecutionFailed { name: a, source: asrc },
                Self::ScriptExecutionFailed { name: b, source: bsrc },
            ) => a == b && asrc == bsrc,
            (
                Self::MigrationFailed { identity: a, direction: ad, cause: ac },
                Self::MigrationFailed { identity: b, direction: bd, cause: bc },
            ) => a == b && ad == bd && ac == bc,
            (Self::UnknownIdentity(a), Self::UnknownIdentity(b)) => a == b,
            (
                Self::ChecksumMismatch { identity: a, recorded: arec, actual: aact },
                Self::ChecksumMismatch { identity: b, recorded: brec, actual: bact },
            ) => a == b && arec == brec && aact == bact,
            (Self::InvalidTarget(a), Self::InvalidTarget(b)) => a == b,
            (Self::Sql(a), Self::Sql(b)) => a == b,
            (Self::Generic(a), Self::Generic(b)) => a == b,
            _ => false,
        }
    }
}
