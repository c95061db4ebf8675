//! End-to-end run of a realistic migration: two related tables, a named
//! foreign key, seeded reference rows with generated identifiers, and an
//! embedded script, applied through the runner against a real connection.

use rusqlite::Connection;
use stratum::{
    Error, Migration, MigrationContext, MigrationIdentity, MigrationRegistry, Runner, SchemaPlan,
    ScriptRegistry,
};
use uuid::Uuid;

const USER_VIEW_SCRIPT: &str = "\
CREATE VIEW user_accounts AS
SELECT u.id, u.username, r.rolename
FROM users u
JOIN roles r ON u.role_id = r.id
WHERE u.is_active = 1;
";

struct CreateUserTables;

impl Migration for CreateUserTables {
    fn identity(&self) -> u64 {
        202609272116
    }

    fn name(&self) -> String {
        "create role and user tables".to_string()
    }

    fn description(&self) -> Option<&'static str> {
        Some("Creates roles and users with seeded admin accounts")
    }

    fn up(&self, ctx: &MigrationContext<'_>) -> Result<(), Error> {
        let admin_role_id = Uuid::now_v7();
        let superadmin_role_id = Uuid::now_v7();

        ctx.apply(
            SchemaPlan::new()
                .create_table("roles")
                .with_column("id").as_guid().primary_key().not_nullable()
                .with_column("rolename").as_string(50).not_nullable()
                .with_column("is_admin").as_boolean().not_nullable()
                .with_column("is_superadmin").as_boolean().not_nullable()
                .with_column("is_active_role").as_boolean().not_nullable()
                .with_column("created_at").as_datetime().not_nullable()
                .with_default_current_utc_timestamp()
                .with_column("updated_at").as_datetime().nullable()
                .with_column("modified_by").as_string(30).nullable()
                .create_table("users")
                .with_column("id").as_guid().primary_key().not_nullable()
                .with_column("role_id").as_guid().not_nullable()
                .with_column("username").as_string(50).not_nullable()
                .with_column("user_password").as_text().nullable()
                .with_column("first_name").as_string(50).not_nullable()
                .with_column("last_name").as_string(50).not_nullable()
                .with_column("personal_email").as_string(50).nullable()
                .with_column("is_active").as_boolean().not_nullable()
                .with_column("created_at").as_datetime().not_nullable()
                .with_default_current_utc_timestamp()
                .with_column("updated_at").as_datetime().nullable()
                .add_foreign_key("fk_users_role_id")
                .from_table("users").foreign_column("role_id")
                .to_table("roles").primary_column("id")
                .insert_into("roles")
                .set("id", admin_role_id)
                .set("rolename", "Admin")
                .set("is_admin", true)
                .set("is_superadmin", false)
                .set("is_active_role", true)
                .insert_into("roles")
                .set("id", superadmin_role_id)
                .set("rolename", "SuperAdmin")
                .set("is_admin", true)
                .set("is_superadmin", true)
                .set("is_active_role", true)
                .insert_into("users")
                .set("id", Uuid::now_v7())
                .set("role_id", admin_role_id)
                .set("username", "admin")
                .set("first_name", "Admin")
                .set("last_name", "Admin")
                .set("is_active", true)
                .insert_into("users")
                .set("id", Uuid::now_v7())
                .set("role_id", superadmin_role_id)
                .set("username", "superadmin")
                .set("first_name", "SuperAdmin")
                .set("last_name", "SuperAdmin")
                .set("is_active", true),
        )?;

        ctx.run_embedded_script("user_accounts.sql")
    }

    // the reverse action is a deliberate no-op: dropping user data is left
    // to an operator, not automated
}

fn runner() -> Runner {
    let registry = MigrationRegistry::try_new(vec![Box::new(CreateUserTables)]).unwrap();
    let scripts = ScriptRegistry::new().with_script("user_accounts.sql", USER_VIEW_SCRIPT);
    Runner::new(registry).with_scripts(scripts)
}

#[test]
fn apply_creates_schema_and_seeds_reference_data() {
    let mut conn = Connection::open_in_memory().unwrap();
    let runner = runner();

    let report = runner.apply(&mut conn).unwrap();
    assert_eq!(
        report.units_run,
        vec![MigrationIdentity::new(202609272116).unwrap()]
    );
    assert!(report.failure.is_none());

    // both seed roles and both seed users exist
    let roles: i64 = conn
        .query_row("SELECT COUNT(*) FROM roles", [], |row| row.get(0))
        .unwrap();
    let users: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(roles, 2);
    assert_eq!(users, 2);

    // each seeded user resolves to its seeded role through the foreign key
    let mut stmt = conn
        .prepare(
            "SELECT u.username, r.rolename FROM users u JOIN roles r ON u.role_id = r.id ORDER BY u.username",
        )
        .unwrap();
    let pairs: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(
        pairs,
        vec![
            ("admin".to_string(), "Admin".to_string()),
            ("superadmin".to_string(), "SuperAdmin".to_string()),
        ]
    );

    // generated identifiers are unique across the seeded rows
    let distinct_ids: i64 = conn
        .query_row("SELECT COUNT(DISTINCT id) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(distinct_ids, 2);

    // the foreign key rejects a child row referencing a non-existent parent
    let orphan = conn.execute(
        "INSERT INTO users (id, role_id, username, first_name, last_name, is_active)
         VALUES ('u-orphan', 'no-such-role', 'ghost', 'Ghost', 'Ghost', 1)",
        [],
    );
    assert!(orphan.is_err());

    // the embedded script installed its view
    let accounts: i64 = conn
        .query_row("SELECT COUNT(*) FROM user_accounts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(accounts, 2);
}

#[test]
fn reapplying_is_a_no_op_so_seeds_are_not_duplicated() {
    let mut conn = Connection::open_in_memory().unwrap();
    let runner = runner();

    runner.apply(&mut conn).unwrap();
    let report = runner.apply(&mut conn).unwrap();
    assert!(report.units_run.is_empty());

    let roles: i64 = conn
        .query_row("SELECT COUNT(*) FROM roles", [], |row| row.get(0))
        .unwrap();
    assert_eq!(roles, 2);
}

#[test]
fn rollback_of_no_op_reverse_clears_ledger_and_keeps_tables() {
    let mut conn = Connection::open_in_memory().unwrap();
    let runner = runner();

    runner.apply(&mut conn).unwrap();
    let report = runner.rollback(&mut conn, 1).unwrap();
    assert_eq!(
        report.units_run,
        vec![MigrationIdentity::new(202609272116).unwrap()]
    );
    assert!(report.failure.is_none());

    // ledger entry removed
    assert!(runner.applied_identities(&mut conn).unwrap().is_empty());

    // forward side effects untouched
    let roles: i64 = conn
        .query_row("SELECT COUNT(*) FROM roles", [], |row| row.get(0))
        .unwrap();
    assert_eq!(roles, 2);
}
