//! End-to-end migrator behaviour against an in-memory SQLite database

use sea_query::{ColumnDef, Index, Table};
use waypoint::migration::{
    DatabaseMigrationRepository, DirectoryLocator, MigrateOptions, Migration, MigrationError,
    MigrationLocator, MigrationRepository, MigrationResolver, Migrator, SchemaManager,
    StaticLocator,
};
use waypoint::{connect, Executor, LifeError, SqliteExecutor};

const MIGRATION_TABLE: &str = "migrations";
const CREATE_USERS: &str = "app::migrations::one::CreateUsersTable";
const CREATE_PASSWORD_RESETS: &str = "app::migrations::one::CreatePasswordResetsTable";

struct CreateUsersTable;

impl Migration for CreateUsersTable {
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError> {
        manager.create_table(
            Table::create()
                .table("users")
                .col(ColumnDef::new("id").integer().not_null().auto_increment().primary_key())
                .col(ColumnDef::new("user_name").string_len(50).not_null())
                .col(ColumnDef::new("email").string_len(254).not_null().unique_key())
                .to_owned(),
        )
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError> {
        manager.drop_table(Table::drop().table("users").to_owned())
    }
}

struct CreatePasswordResetsTable;

impl Migration for CreatePasswordResetsTable {
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError> {
        manager.create_table(
            Table::create()
                .table("password_resets")
                .col(ColumnDef::new("id").integer().not_null().auto_increment().primary_key())
                .col(ColumnDef::new("user_id").integer().not_null())
                .col(ColumnDef::new("hash").string_len(255).not_null())
                .to_owned(),
        )?;
        manager.create_index(
            Index::create()
                .name("idx_password_resets_user_id")
                .table("password_resets")
                .col("user_id")
                .to_owned(),
        )
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError> {
        manager.drop_table(Table::drop().table("password_resets").to_owned())
    }
}

/// Only reachable through its legacy name
struct DeprecatedClassTable;

impl Migration for DeprecatedClassTable {
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError> {
        manager.create_table(
            Table::create()
                .table("deprecated_table")
                .col(ColumnDef::new("id").integer().not_null().primary_key())
                .to_owned(),
        )
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError> {
        manager.drop_table(Table::drop().table("deprecated_table").to_owned())
    }
}

#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn resolver() -> MigrationResolver {
    let mut resolver = MigrationResolver::new();
    resolver.register(CREATE_USERS, CreateUsersTable).expect("register");
    resolver
        .register(CREATE_PASSWORD_RESETS, CreatePasswordResetsTable)
        .expect("register");
    resolver
        .register_legacy("DeprecatedClassTable", DeprecatedClassTable)
        .expect("register legacy");
    resolver
}

fn locator() -> StaticLocator {
    StaticLocator::new([CREATE_USERS, CREATE_PASSWORD_RESETS])
}

#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn migrator(executor: &dyn Executor) -> Migrator<'_> {
    let repository =
        DatabaseMigrationRepository::new(executor, MIGRATION_TABLE).expect("repository");
    if !repository.repository_exists().expect("repository_exists") {
        repository.create_repository().expect("create repository");
    }
    Migrator::new(repository, executor, locator(), resolver())
}

fn reversed(mut migrations: Vec<String>) -> Vec<String> {
    migrations.reverse();
    migrations
}

#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn has_table(executor: &dyn Executor, table: &str) -> bool {
    executor.has_table(table).expect("has_table")
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_migration_repository_created() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let migrator = migrator(&executor);
    assert!(migrator.repository_exists().expect("exists"));
    assert!(has_table(&executor, MIGRATION_TABLE));

    // Creating again is harmless
    migrator.create_repository().expect("create again");
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_basic_migration() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);

    let ran = migrator.run(MigrateOptions::default()).expect("run");
    assert!(has_table(&executor, "users"));
    assert!(has_table(&executor, "password_resets"));
    assert_eq!(ran, locator().get_migrations().expect("locate"));
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_repository_matches_locator_format() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);
    let ran = migrator.run(MigrateOptions::default()).expect("run");

    let expected = locator().get_migrations().expect("locate");
    assert_eq!(ran, expected);
    assert_eq!(migrator.repository().get_last().expect("last"), reversed(expected.clone()));
    assert_eq!(migrator.repository().get_ran().expect("ran"), expected);
    assert_eq!(migrator.repository().get_next_batch_number().expect("next"), 2);
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_migrations_can_be_rolled_back() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);
    migrator.run(MigrateOptions::default()).expect("run");
    assert!(has_table(&executor, "users"));
    assert!(has_table(&executor, "password_resets"));

    let rolled_back = migrator.rollback(MigrateOptions::default()).expect("rollback");
    assert!(!has_table(&executor, "users"));
    assert!(!has_table(&executor, "password_resets"));
    assert_eq!(rolled_back, reversed(locator().get_migrations().expect("locate")));
    assert!(migrator.repository().get_ran().expect("ran").is_empty());
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_migrations_can_be_reset() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);
    migrator.run(MigrateOptions::default()).expect("run");

    let rolled_back = migrator.reset(MigrateOptions::default()).expect("reset");
    assert!(!has_table(&executor, "users"));
    assert!(!has_table(&executor, "password_resets"));
    assert_eq!(rolled_back, reversed(locator().get_migrations().expect("locate")));
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_no_error_when_no_outstanding_migrations() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);
    migrator.run(MigrateOptions::default()).expect("run");

    let ran = migrator.run(MigrateOptions::default()).expect("second run");
    assert!(ran.is_empty());
    assert_eq!(migrator.notes(), ["Nothing to migrate"]);
    assert!(has_table(&executor, "users"));
    assert!(has_table(&executor, "password_resets"));
    assert_eq!(migrator.repository().get_next_batch_number().expect("next"), 2);
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_no_error_when_nothing_to_rollback() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);
    migrator.run(MigrateOptions::default()).expect("run");
    migrator.rollback(MigrateOptions::default()).expect("rollback");

    let rolled_back = migrator.rollback(MigrateOptions::default()).expect("second rollback");
    assert!(rolled_back.is_empty());
    assert_eq!(migrator.notes(), ["Nothing to rollback"]);
    assert!(!has_table(&executor, "users"));
    assert!(!has_table(&executor, "password_resets"));
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_pretend_up() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);

    let ran = migrator.run(MigrateOptions::pretend()).expect("pretend run");
    assert_eq!(ran, locator().get_migrations().expect("locate"));
    assert!(!has_table(&executor, "users"));
    assert!(!has_table(&executor, "password_resets"));
    assert!(migrator.repository().get_ran().expect("ran").is_empty());

    let notes = migrator.notes();
    assert!(!notes.is_empty());
    assert!(notes.iter().any(|n| n.starts_with(CREATE_USERS) && n.contains("users")));
    assert!(notes
        .iter()
        .any(|n| n.starts_with(CREATE_PASSWORD_RESETS) && n.contains("CREATE INDEX")));
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_pretend_rollback() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);
    migrator.run(MigrateOptions::default()).expect("run");
    let before = migrator.repository().get_ran().expect("ran");

    let rolled_back = migrator.rollback(MigrateOptions::pretend()).expect("pretend rollback");
    assert!(has_table(&executor, "users"));
    assert!(has_table(&executor, "password_resets"));
    assert_eq!(rolled_back, reversed(locator().get_migrations().expect("locate")));
    assert_eq!(migrator.repository().get_ran().expect("ran"), before);
    assert!(migrator.notes().iter().any(|n| n.contains("DROP TABLE")));
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_change_locator_and_deprecated_class() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);
    migrator.set_locator(StaticLocator::new(["app::migrations::DeprecatedClassTable"]));

    migrator.run(MigrateOptions::default()).expect("run");
    assert!(has_table(&executor, "deprecated_table"));
    assert!(migrator
        .notes()
        .iter()
        .any(|n| n.starts_with("Resolved deprecated migration name")));
    // Recorded under the locator's identifier, not the legacy name
    assert_eq!(
        migrator.repository().get_ran().expect("ran"),
        vec!["app::migrations::DeprecatedClassTable"]
    );

    migrator.rollback(MigrateOptions::default()).expect("rollback");
    assert!(!has_table(&executor, "deprecated_table"));
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_with_invalid_class() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);
    migrator.set_locator(StaticLocator::new(["app::migrations::Foo"]));

    let result = migrator.run(MigrateOptions::default());
    assert!(matches!(
        result,
        Err(MigrationError::BadClassName(ref id)) if id == "app::migrations::Foo"
    ));
    assert!(migrator.repository().get_ran().expect("ran").is_empty());
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_invalid_class_stops_run_and_keeps_earlier_steps() {
    let executor = SqliteExecutor::open_in_memory().expect("open");
    let mut migrator = migrator(&executor);
    migrator.set_locator(StaticLocator::new([
        CREATE_USERS,
        "app::migrations::Foo",
        CREATE_PASSWORD_RESETS,
    ]));

    let result = migrator.run(MigrateOptions::default());
    assert!(matches!(
        result,
        Err(MigrationError::BadClassName(ref id)) if id == "app::migrations::Foo"
    ));
    assert_eq!(migrator.repository().get_ran().expect("ran"), vec![CREATE_USERS]);
    assert!(has_table(&executor, "users"));
    assert!(!has_table(&executor, "password_resets"));
}

#[test]
#[allow(clippy::expect_used)] // Test code - expect is acceptable
fn test_directory_locator_drives_migrator() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("m20240101000000_create_users_table.rs"), "").expect("write");
    std::fs::write(
        dir.path().join("m20240102000000_create_password_resets_table.rs"),
        "",
    )
    .expect("write");

    let executor = connect(":memory:").expect("connect");
    let repository =
        DatabaseMigrationRepository::new(executor.as_ref(), MIGRATION_TABLE).expect("repository");
    repository.create_repository().expect("create repository");

    let mut resolver = MigrationResolver::new();
    resolver
        .register("app::m20240101000000_create_users_table", CreateUsersTable)
        .expect("register");
    resolver
        .register(
            "app::m20240102000000_create_password_resets_table",
            CreatePasswordResetsTable,
        )
        .expect("register");

    let locator = DirectoryLocator::new().with_source("app", dir.path());
    let mut migrator = Migrator::new(repository, executor.as_ref(), locator, resolver);

    let ran = migrator.run(MigrateOptions::default()).expect("run");
    assert_eq!(
        ran,
        vec![
            "app::m20240101000000_create_users_table",
            "app::m20240102000000_create_password_resets_table",
        ]
    );
    assert!(has_table(executor.as_ref(), "password_resets"));
    assert!(migrator.status().expect("status").is_up_to_date());
}
