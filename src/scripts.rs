//! Embedded script resolution: a name to raw-statement-text lookup.
//!
//! Scripts are static text, registered by the host (typically with
//! `include_str!` so the file lives next to the migration that runs it) and
//! executed verbatim within a migration's transaction. No parameter
//! substitution is performed, which makes scripts suitable for stored views
//! or procedures whose ownership outlives the migration.

use std::collections::BTreeMap;

use crate::error::Error;

/// Name → statement-text registry for embedded scripts.
///
/// ```
/// use stratum::ScriptRegistry;
///
/// let scripts = ScriptRegistry::new()
///     .with_script("usr_get_by_username.sql", "CREATE VIEW usr AS SELECT 1 AS id");
/// assert!(scripts.resolve("usr_get_by_username.sql").is_ok());
/// assert!(scripts.resolve("missing.sql").is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct ScriptRegistry {
    scripts: BTreeMap<String, String>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script under a name. A later registration under the same
    /// name replaces the earlier one.
    pub fn with_script(mut self, name: &str, sql: &str) -> Self {
        self.scripts.insert(name.to_string(), sql.to_string());
        self
    }

    pub fn register(&mut self, name: &str, sql: &str) {
        self.scripts.insert(name.to_string(), sql.to_string());
    }

    /// Resolve a script name to its text.
    pub fn resolve(&self, name: &str) -> Result<&str, Error> {
        self.scripts
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::ScriptNotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
