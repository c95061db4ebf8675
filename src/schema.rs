//! The fluent schema builder: a pure, order-independent construction API for
//! tables, columns, foreign keys, and seed rows.
//!
//! A [SchemaPlan] performs no I/O. Chained calls record declarative
//! operations; [SchemaPlan::build] validates the whole plan and produces an
//! ordered list of [SchemaChange] values, which a migration action hands to
//! [MigrationContext::apply](crate::MigrationContext::apply) for execution
//! inside the enclosing transaction. This keeps "what to change" separate
//! from "how it is sent to the database", so plans can be unit-tested without
//! a connection.
//!
//! ```
//! use stratum::{ColumnType, SchemaChange, SchemaPlan};
//!
//! let changes = SchemaPlan::new()
//!     .create_table("roles")
//!     .with_column("id").as_guid().primary_key().not_nullable()
//!     .with_column("name").as_string(50).not_nullable()
//!     .create_table("users")
//!     .with_column("id").as_guid().primary_key().not_nullable()
//!     .with_column("role_id").as_guid().not_nullable()
//!     .add_foreign_key("fk_users_role_id")
//!     .from_table("users").foreign_column("role_id")
//!     .to_table("roles").primary_column("id")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(changes.len(), 3);
//! match &changes[0] {
//!     SchemaChange::CreateTable(table) => {
//!         assert_eq!(table.name, "roles");
//!         assert_eq!(table.columns[0].column_type, ColumnType::Guid);
//!     }
//!     other => panic!("unexpected change: {other:?}"),
//! }
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;

/// The type of a column, carried as data until render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Guid,
    /// A length-limited string. SQLite does not enforce the length; it is
    /// kept for rendering and for documentation of intent.
    String(u32),
    Text,
    Boolean,
    Integer,
    BigInteger,
    DateTime,
    Binary,
}

/// A column default, either a literal or a provider evaluated by the
/// database at insert time.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    CurrentUtcTimestamp,
    Literal(Value),
}

/// A literal value for seed rows and column defaults. Rendered as a bound
/// parameter in DML, never interpolated into statement text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Guid(Uuid),
    Text(String),
    Bool(bool),
    Int(i64),
    Timestamp(DateTime<Utc>),
    Null,
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Guid(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// A fully validated column description.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<DefaultValue>,
}

/// A fully validated table description.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

/// A named foreign key from a child table/column to a parent table/column.
/// The constraint name is recorded for rollback reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeySpec {
    pub constraint: String,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// One declarative schema operation, produced by [SchemaPlan::build] and
/// consumed once at apply time.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    CreateTable(TableSpec),
    AddColumn { table: String, column: ColumnSpec },
    AddForeignKey(ForeignKeySpec),
    InsertRow { table: String, values: Vec<(String, Value)> },
    DeleteRows { table: String, column: String, value: Value },
    DropTable { name: String },
}

#[derive(Debug)]
struct PendingColumn {
    name: String,
    column_type: Option<ColumnType>,
    nullable: Option<bool>,
    primary_key: bool,
    default: Option<DefaultValue>,
}

impl PendingColumn {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: None,
            nullable: None,
            primary_key: false,
            default: None,
        }
    }
}

#[derive(Debug)]
struct PendingForeignKey {
    constraint: String,
    from_table: Option<String>,
    from_column: Option<String>,
    to_table: Option<String>,
    to_column: Option<String>,
}

#[derive(Debug)]
enum Pending {
    CreateTable { name: String, columns: Vec<PendingColumn> },
    AddColumn { table: String, column: PendingColumn },
    ForeignKey(PendingForeignKey),
    InsertRow { table: String, values: Vec<(String, Value)> },
    DeleteRows { table: String, column: String, value: Value },
    DropTable { name: String },
}

/// Fluent builder for an ordered list of [SchemaChange] operations.
///
/// Column modifiers (`as_*`, `nullable`, `primary_key`, defaults) apply to
/// the most recently declared column, foreign key modifiers to the most
/// recently declared constraint, and `set` to the most recently started row.
/// Misuse (a modifier with nothing in progress, a column without a type or
/// nullability, a constraint naming an unknown table) is recorded and
/// surfaced by [SchemaPlan::build] as [Error::SchemaChangeRejected]; the
/// builder itself never panics.
#[derive(Debug, Default)]
pub struct SchemaPlan {
    pending: Vec<Pending>,
    external_tables: BTreeSet<String>,
    misuse: Vec<String>,
}

impl SchemaPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a table as externally known, so foreign keys and row operations
    /// may reference it even though this plan does not create it.
    pub fn declare_existing_table(mut self, name: &str) -> Self {
        self.external_tables.insert(name.to_string());
        self
    }

    /// Begin a new table. Columns follow via [SchemaPlan::with_column].
    pub fn create_table(mut self, name: &str) -> Self {
        self.pending.push(Pending::CreateTable {
            name: name.to_string(),
            columns: Vec::new(),
        });
        self
    }

    /// Declare a column on the table begun by the preceding
    /// [SchemaPlan::create_table] call.
    pub fn with_column(mut self, name: &str) -> Self {
        match self.pending.last_mut() {
            Some(Pending::CreateTable { columns, .. }) => {
                columns.push(PendingColumn::new(name));
            }
            _ => self.misuse.push(format!(
                "with_column('{name}') called outside a create_table declaration"
            )),
        }
        self
    }

    /// Add a single column to a table that already exists (or is created
    /// earlier in this plan).
    pub fn add_column(mut self, table: &str, name: &str) -> Self {
        self.pending.push(Pending::AddColumn {
            table: table.to_string(),
            column: PendingColumn::new(name),
        });
        self
    }

    fn current_column(&mut self) -> Option<&mut PendingColumn> {
        match self.pending.last_mut() {
            Some(Pending::CreateTable { columns, .. }) => columns.last_mut(),
            Some(Pending::AddColumn { column, .. }) => Some(column),
            _ => None,
        }
    }

    fn set_type(mut self, column_type: ColumnType, modifier: &str) -> Self {
        let mut problem = None;
        match self.current_column() {
            Some(column) => {
                if column.column_type.is_some() {
                    problem = Some(format!(
                        "column '{}' declares more than one type",
                        column.name
                    ));
                } else {
                    column.column_type = Some(column_type);
                }
            }
            None => problem = Some(format!("{modifier} called with no column in progress")),
        }
        if let Some(problem) = problem {
            self.misuse.push(problem);
        }
        self
    }

    pub fn as_guid(self) -> Self {
        self.set_type(ColumnType::Guid, "as_guid()")
    }

    pub fn as_string(self, length: u32) -> Self {
        self.set_type(ColumnType::String(length), "as_string()")
    }

    pub fn as_text(self) -> Self {
        self.set_type(ColumnType::Text, "as_text()")
    }

    pub fn as_boolean(self) -> Self {
        self.set_type(ColumnType::Boolean, "as_boolean()")
    }

    pub fn as_integer(self) -> Self {
        self.set_type(ColumnType::Integer, "as_integer()")
    }

    pub fn as_big_integer(self) -> Self {
        self.set_type(ColumnType::BigInteger, "as_big_integer()")
    }

    pub fn as_datetime(self) -> Self {
        self.set_type(ColumnType::DateTime, "as_datetime()")
    }

    pub fn as_binary(self) -> Self {
        self.set_type(ColumnType::Binary, "as_binary()")
    }

    pub fn nullable(mut self) -> Self {
        match self.current_column() {
            Some(column) => column.nullable = Some(true),
            None => self
                .misuse
                .push("nullable() called with no column in progress".to_string()),
        }
        self
    }

    pub fn not_nullable(mut self) -> Self {
        match self.current_column() {
            Some(column) => column.nullable = Some(false),
            None => self
                .misuse
                .push("not_nullable() called with no column in progress".to_string()),
        }
        self
    }

    pub fn primary_key(mut self) -> Self {
        match self.current_column() {
            Some(column) => column.primary_key = true,
            None => self
                .misuse
                .push("primary_key() called with no column in progress".to_string()),
        }
        self
    }

    /// Set a literal default for the current column.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.current_column() {
            Some(column) => column.default = Some(DefaultValue::Literal(value)),
            None => self
                .misuse
                .push("with_default() called with no column in progress".to_string()),
        }
        self
    }

    /// Default the current column to the database's current UTC timestamp.
    pub fn with_default_current_utc_timestamp(mut self) -> Self {
        match self.current_column() {
            Some(column) => column.default = Some(DefaultValue::CurrentUtcTimestamp),
            None => self.misuse.push(
                "with_default_current_utc_timestamp() called with no column in progress"
                    .to_string(),
            ),
        }
        self
    }

    /// Begin a named foreign key declaration. The child table must be created
    /// within this plan; the parent may be created here or declared via
    /// [SchemaPlan::declare_existing_table].
    pub fn add_foreign_key(mut self, constraint: &str) -> Self {
        self.pending.push(Pending::ForeignKey(PendingForeignKey {
            constraint: constraint.to_string(),
            from_table: None,
            from_column: None,
            to_table: None,
            to_column: None,
        }));
        self
    }

    fn current_foreign_key(&mut self) -> Option<&mut PendingForeignKey> {
        match self.pending.last_mut() {
            Some(Pending::ForeignKey(fk)) => Some(fk),
            _ => None,
        }
    }

    pub fn from_table(mut self, table: &str) -> Self {
        match self.current_foreign_key() {
            Some(fk) => fk.from_table = Some(table.to_string()),
            None => self
                .misuse
                .push("from_table() called with no foreign key in progress".to_string()),
        }
        self
    }

    pub fn foreign_column(mut self, column: &str) -> Self {
        match self.current_foreign_key() {
            Some(fk) => fk.from_column = Some(column.to_string()),
            None => self
                .misuse
                .push("foreign_column() called with no foreign key in progress".to_string()),
        }
        self
    }

    pub fn to_table(mut self, table: &str) -> Self {
        match self.current_foreign_key() {
            Some(fk) => fk.to_table = Some(table.to_string()),
            None => self
                .misuse
                .push("to_table() called with no foreign key in progress".to_string()),
        }
        self
    }

    pub fn primary_column(mut self, column: &str) -> Self {
        match self.current_foreign_key() {
            Some(fk) => fk.to_column = Some(column.to_string()),
            None => self
                .misuse
                .push("primary_column() called with no foreign key in progress".to_string()),
        }
        self
    }

    /// Begin a seed row for the named table. Column values follow via
    /// [SchemaPlan::set]; call `insert_into` once per row.
    pub fn insert_into(mut self, table: &str) -> Self {
        self.pending.push(Pending::InsertRow {
            table: table.to_string(),
            values: Vec::new(),
        });
        self
    }

    /// Set one column of the row begun by the preceding
    /// [SchemaPlan::insert_into] call.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.pending.last_mut() {
            Some(Pending::InsertRow { values, .. }) => {
                values.push((column.to_string(), value));
            }
            _ => self
                .misuse
                .push(format!("set('{column}') called with no row in progress")),
        }
        self
    }

    /// Delete rows where `column` equals `value`; the reverse-action
    /// counterpart of seeded inserts.
    pub fn delete_rows(mut self, table: &str, column: &str, value: impl Into<Value>) -> Self {
        self.pending.push(Pending::DeleteRows {
            table: table.to_string(),
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn drop_table(mut self, name: &str) -> Self {
        self.pending.push(Pending::DropTable {
            name: name.to_string(),
        });
        self
    }

    /// Validate the whole plan and produce the ordered change list.
    ///
    /// Checks: every column declares a type and explicit nullability; no
    /// duplicate columns within a table; foreign keys are complete, their
    /// child table is created within this plan (SQLite cannot attach a
    /// constraint to an existing table) and their parent table is created
    /// here or externally declared; row operations target known tables and
    /// statements execute in declaration order, so a row operation may not
    /// precede the creation of its table.
    pub fn build(self) -> Result<Vec<SchemaChange>, Error> {
        if let Some(first) = self.misuse.into_iter().next() {
            return Err(Error::SchemaChangeRejected(first));
        }

        // Tables created anywhere in the plan; foreign keys validate against
        // this full set since they are folded into the child's CREATE
        // statement at render time.
        let mut created_anywhere: BTreeSet<String> = BTreeSet::new();
        for entry in &self.pending {
            if let Pending::CreateTable { name, .. } = entry {
                if !created_anywhere.insert(name.clone()) {
                    return Err(Error::SchemaChangeRejected(format!(
                        "table '{name}' is created twice in the same plan"
                    )));
                }
                if self.external_tables.contains(name) {
                    return Err(Error::SchemaChangeRejected(format!(
                        "table '{name}' is both created and declared as existing"
                    )));
                }
            }
        }

        let mut changes = Vec::with_capacity(self.pending.len());
        // Tables available at each point of the executed sequence.
        let mut available: BTreeSet<String> = self.external_tables.clone();

        for entry in self.pending {
            match entry {
                Pending::CreateTable { name, columns } => {
                    validate_identifier(&name, "table name")?;
                    if columns.is_empty() {
                        return Err(Error::SchemaChangeRejected(format!(
                            "table '{name}' must declare at least one column"
                        )));
                    }
                    let mut seen = BTreeSet::new();
                    let mut specs = Vec::with_capacity(columns.len());
                    for column in columns {
                        let spec = finish_column(&name, column)?;
                        if !seen.insert(spec.name.clone()) {
                            return Err(Error::SchemaChangeRejected(format!(
                                "table '{name}' declares column '{}' twice",
                                spec.name
                            )));
                        }
                        specs.push(spec);
                    }
                    available.insert(name.clone());
                    changes.push(SchemaChange::CreateTable(TableSpec {
                        name,
                        columns: specs,
                    }));
                }
                Pending::AddColumn { table, column } => {
                    require_table(&available, &table, "add_column")?;
                    let spec = finish_column(&table, column)?;
                    if spec.primary_key {
                        return Err(Error::SchemaChangeRejected(format!(
                            "cannot add primary key column '{}' to existing table '{table}'",
                            spec.name
                        )));
                    }
                    changes.push(SchemaChange::AddColumn {
                        table,
                        column: spec,
                    });
                }
                Pending::ForeignKey(fk) => {
                    let spec = finish_foreign_key(fk)?;
                    if !created_anywhere.contains(&spec.from_table) {
                        return Err(Error::SchemaChangeRejected(format!(
                            "foreign key '{}': table '{}' is not created in this plan; a constraint cannot be attached to an existing table",
                            spec.constraint, spec.from_table
                        )));
                    }
                    if !created_anywhere.contains(&spec.to_table)
                        && !self.external_tables.contains(&spec.to_table)
                    {
                        return Err(Error::SchemaChangeRejected(format!(
                            "foreign key '{}' references unknown table '{}'",
                            spec.constraint, spec.to_table
                        )));
                    }
                    changes.push(SchemaChange::AddForeignKey(spec));
                }
                Pending::InsertRow { table, values } => {
                    require_table(&available, &table, "insert_into")?;
                    if values.is_empty() {
                        return Err(Error::SchemaChangeRejected(format!(
                            "row for table '{table}' sets no columns"
                        )));
                    }
                    let mut seen = BTreeSet::new();
                    for (column, _) in &values {
                        if !seen.insert(column.clone()) {
                            return Err(Error::SchemaChangeRejected(format!(
                                "row for table '{table}' sets column '{column}' twice"
                            )));
                        }
                    }
                    changes.push(SchemaChange::InsertRow { table, values });
                }
                Pending::DeleteRows { table, column, value } => {
                    require_table(&available, &table, "delete_rows")?;
                    changes.push(SchemaChange::DeleteRows {
                        table,
                        column,
                        value,
                    });
                }
                Pending::DropTable { name } => {
                    require_table(&available, &name, "drop_table")?;
                    available.remove(&name);
                    changes.push(SchemaChange::DropTable { name });
                }
            }
        }

        Ok(changes)
    }
}

fn validate_identifier(name: &str, what: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::SchemaChangeRejected(format!("{what} is empty")));
    }
    if name.contains('"') {
        return Err(Error::SchemaChangeRejected(format!(
            "{what} '{name}' contains a quote character"
        )));
    }
    Ok(())
}

fn require_table(available: &BTreeSet<String>, table: &str, operation: &str) -> Result<(), Error> {
    if !available.contains(table) {
        return Err(Error::SchemaChangeRejected(format!(
            "{operation} targets table '{table}', which is neither created earlier in this plan nor declared as existing"
        )));
    }
    Ok(())
}

fn finish_column(table: &str, column: PendingColumn) -> Result<ColumnSpec, Error> {
    validate_identifier(&column.name, "column name")?;
    let column_type = column.column_type.ok_or_else(|| {
        Error::SchemaChangeRejected(format!(
            "column '{}.{}' must declare a type",
            table, column.name
        ))
    })?;
    let nullable = column.nullable.ok_or_else(|| {
        Error::SchemaChangeRejected(format!(
            "column '{}.{}' must declare nullability before constraints apply",
            table, column.name
        ))
    })?;
    Ok(ColumnSpec {
        name: column.name,
        column_type,
        nullable,
        primary_key: column.primary_key,
        default: column.default,
    })
}

fn finish_foreign_key(fk: PendingForeignKey) -> Result<ForeignKeySpec, Error> {
    validate_identifier(&fk.constraint, "constraint name")?;
    let missing = |part: &str| {
        Error::SchemaChangeRejected(format!(
            "foreign key '{}' is missing its {part} declaration",
            fk.constraint
        ))
    };
    Ok(ForeignKeySpec {
        from_table: fk.from_table.clone().ok_or_else(|| missing("from_table"))?,
        from_column: fk.from_column.clone().ok_or_else(|| missing("foreign_column"))?,
        to_table: fk.to_table.clone().ok_or_else(|| missing("to_table"))?,
        to_column: fk.to_column.clone().ok_or_else(|| missing("primary_column"))?,
        constraint: fk.constraint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tables_in_declaration_order() {
        let changes = SchemaPlan::new()
            .create_table("a")
            .with_column("id").as_integer().primary_key().not_nullable()
            .create_table("b")
            .with_column("id").as_integer().primary_key().not_nullable()
            .build()
            .unwrap();

        let names: Vec<&str> = changes
            .iter()
            .map(|c| match c {
                SchemaChange::CreateTable(t) => t.name.as_str(),
                other => panic!("unexpected change: {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn column_must_declare_type() {
        let err = SchemaPlan::new()
            .create_table("t")
            .with_column("id").not_nullable()
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::SchemaChangeRejected("column 't.id' must declare a type".to_string())
        );
    }

    #[test]
    fn column_must_declare_nullability() {
        let err = SchemaPlan::new()
            .create_table("t")
            .with_column("id").as_guid().primary_key()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("nullability")));
    }

    #[test]
    fn modifier_without_column_is_rejected_at_build() {
        let err = SchemaPlan::new().primary_key().build().unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("primary_key()")));
    }

    #[test]
    fn double_type_declaration_is_rejected() {
        let err = SchemaPlan::new()
            .create_table("t")
            .with_column("id").as_guid().as_text().not_nullable()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("more than one type")));
    }

    #[test]
    fn duplicate_column_is_rejected() {
        let err = SchemaPlan::new()
            .create_table("t")
            .with_column("id").as_integer().not_nullable()
            .with_column("id").as_integer().not_nullable()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("twice")));
    }

    #[test]
    fn foreign_key_requires_known_parent() {
        let err = SchemaPlan::new()
            .create_table("child")
            .with_column("id").as_integer().primary_key().not_nullable()
            .with_column("parent_id").as_integer().not_nullable()
            .add_foreign_key("fk_child_parent")
            .from_table("child").foreign_column("parent_id")
            .to_table("parent").primary_column("id")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("unknown table 'parent'")));
    }

    #[test]
    fn foreign_key_accepts_externally_declared_parent() {
        let changes = SchemaPlan::new()
            .declare_existing_table("parent")
            .create_table("child")
            .with_column("id").as_integer().primary_key().not_nullable()
            .with_column("parent_id").as_integer().not_nullable()
            .add_foreign_key("fk_child_parent")
            .from_table("child").foreign_column("parent_id")
            .to_table("parent").primary_column("id")
            .build()
            .unwrap();
        assert!(matches!(changes.last(), Some(SchemaChange::AddForeignKey(_))));
    }

    #[test]
    fn foreign_key_child_must_be_created_in_plan() {
        let err = SchemaPlan::new()
            .declare_existing_table("child")
            .declare_existing_table("parent")
            .add_foreign_key("fk")
            .from_table("child").foreign_column("parent_id")
            .to_table("parent").primary_column("id")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("cannot be attached")));
    }

    #[test]
    fn foreign_key_declared_before_tables_is_accepted() {
        // construction is order-independent: the constraint resolves at
        // render time onto the child's CREATE statement
        let changes = SchemaPlan::new()
            .add_foreign_key("fk")
            .from_table("child").foreign_column("parent_id")
            .to_table("parent").primary_column("id")
            .create_table("parent")
            .with_column("id").as_integer().primary_key().not_nullable()
            .create_table("child")
            .with_column("id").as_integer().primary_key().not_nullable()
            .with_column("parent_id").as_integer().not_nullable()
            .build()
            .unwrap();
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn incomplete_foreign_key_is_rejected() {
        let err = SchemaPlan::new()
            .create_table("child")
            .with_column("id").as_integer().primary_key().not_nullable()
            .add_foreign_key("fk")
            .from_table("child").foreign_column("parent_id")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("to_table")));
    }

    #[test]
    fn insert_into_unknown_table_is_rejected() {
        let err = SchemaPlan::new()
            .insert_into("nowhere")
            .set("id", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("nowhere")));
    }

    #[test]
    fn insert_before_create_is_rejected() {
        // statements execute in declaration order
        let err = SchemaPlan::new()
            .insert_into("t")
            .set("id", 1)
            .create_table("t")
            .with_column("id").as_integer().primary_key().not_nullable()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(_)));
    }

    #[test]
    fn empty_row_is_rejected() {
        let err = SchemaPlan::new()
            .create_table("t")
            .with_column("id").as_integer().primary_key().not_nullable()
            .insert_into("t")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("sets no columns")));
    }

    #[test]
    fn add_column_cannot_be_primary_key() {
        let err = SchemaPlan::new()
            .declare_existing_table("t")
            .add_column("t", "extra").as_integer().not_nullable().primary_key()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("primary key")));
    }

    #[test]
    fn drop_table_requires_known_table() {
        let err = SchemaPlan::new().drop_table("ghost").build().unwrap_err();
        assert!(matches!(err, Error::SchemaChangeRejected(msg) if msg.contains("ghost")));

        let changes = SchemaPlan::new()
            .declare_existing_table("real")
            .drop_table("real")
            .build()
            .unwrap();
        assert_eq!(changes, vec![SchemaChange::DropTable { name: "real".to_string() }]);
    }

    #[test]
    fn seed_rows_carry_typed_values() {
        let id = Uuid::now_v7();
        let changes = SchemaPlan::new()
            .create_table("roles")
            .with_column("id").as_guid().primary_key().not_nullable()
            .with_column("name").as_string(50).not_nullable()
            .with_column("is_admin").as_boolean().not_nullable()
            .insert_into("roles")
            .set("id", id)
            .set("name", "Admin")
            .set("is_admin", true)
            .build()
            .unwrap();

        match &changes[1] {
            SchemaChange::InsertRow { table, values } => {
                assert_eq!(table, "roles");
                assert_eq!(values[0], ("id".to_string(), Value::Guid(id)));
                assert_eq!(values[1], ("name".to_string(), Value::Text("Admin".to_string())));
                assert_eq!(values[2], ("is_admin".to_string(), Value::Bool(true)));
            }
            other => panic!("unexpected change: {other:?}"),
        }
    }
}
