use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;
use crate::identity::MigrationIdentity;
use crate::migration::Migration;

/// Holds the universe of migration units for the process lifetime, validates
/// identity uniqueness and format at registration, and produces the
/// deterministic ascending execution sequence.
///
/// Once the ordered sequence has been read the registry is sealed: further
/// registration fails with [Error::RegistrySealed], so discovery happens
/// exactly once per run.
///
/// ```
/// use stratum::{Error, Migration, MigrationContext, MigrationRegistry};
///
/// struct CreateRoles;
/// impl Migration for CreateRoles {
///     fn identity(&self) -> u64 { 202601151200 }
///     fn up(&self, _ctx: &MigrationContext<'_>) -> Result<(), Error> { Ok(()) }
/// }
///
/// let mut registry = MigrationRegistry::new();
/// registry.register(Box::new(CreateRoles)).unwrap();
/// assert!(matches!(
///     registry.register(Box::new(CreateRoles)),
///     Err(Error::DuplicateIdentity(_))
/// ));
/// ```
#[derive(Default)]
pub struct MigrationRegistry {
    // kept sorted ascending by identity
    units: Vec<(MigrationIdentity, Box<dyn Migration>)>,
    sealed: AtomicBool,
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("units", &self.units.iter().map(|(_, u)| u).collect::<Vec<_>>())
            .field("sealed", &self.sealed.load(Ordering::Relaxed))
            .finish()
    }
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an explicit unit list, validating identity
    /// format and uniqueness.
    pub fn try_new(units: Vec<Box<dyn Migration>>) -> Result<Self, Error> {
        let mut registry = Self::new();
        for unit in units {
            registry.register(unit)?;
        }
        Ok(registry)
    }

    /// Register a unit. Fails with [Error::MalformedIdentity] if the raw
    /// identity does not parse, [Error::DuplicateIdentity] if the identity is
    /// already present (the registry is left unchanged), or
    /// [Error::RegistrySealed] after the ordering has been read.
    pub fn register(&mut self, unit: Box<dyn Migration>) -> Result<(), Error> {
        if self.sealed.load(Ordering::Relaxed) {
            return Err(Error::RegistrySealed);
        }
        let identity = MigrationIdentity::new(unit.identity())?;
        match self.units.binary_search_by_key(&identity, |(id, _)| *id) {
            Ok(_) => Err(Error::DuplicateIdentity(identity)),
            Err(position) => {
                self.units.insert(position, (identity, unit));
                Ok(())
            }
        }
    }

    /// The units in ascending identity order — a total order, no ties.
    /// Reading this seals the registry.
    pub fn ordered_units(&self) -> &[(MigrationIdentity, Box<dyn Migration>)] {
        self.sealed.store(true, Ordering::Relaxed);
        &self.units
    }

    /// The ordered subset of units whose identity is absent from the ledger.
    pub fn pending(
        &self,
        applied: &BTreeSet<MigrationIdentity>,
    ) -> Vec<(MigrationIdentity, &dyn Migration)> {
        self.ordered_units()
            .iter()
            .filter(|(identity, _)| !applied.contains(identity))
            .map(|(identity, unit)| (*identity, unit.as_ref()))
            .collect()
    }

    pub fn get(&self, identity: MigrationIdentity) -> Option<&dyn Migration> {
        self.units
            .binary_search_by_key(&identity, |(id, _)| *id)
            .ok()
            .map(|position| self.units[position].1.as_ref())
    }

    pub fn contains(&self, identity: MigrationIdentity) -> bool {
        self.get(identity).is_some()
    }

    pub fn identities(&self) -> impl Iterator<Item = MigrationIdentity> + '_ {
        self.units.iter().map(|(identity, _)| *identity)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
