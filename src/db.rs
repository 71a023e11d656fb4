use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};

use crate::error::AppResult;

/// Opens the pool, applies connection pragmas and runs pending migrations.
pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut opts = ConnectOptions::new(database_url);
    opts.sqlx_logging(false);
    // Every pooled connection to `sqlite::memory:` would get its own database.
    if database_url.contains(":memory:") {
        opts.max_connections(1).min_connections(1);
    }

    let db = Database::connect(opts).await?;

    pragma(&db, "PRAGMA foreign_keys=ON").await?;
    pragma(&db, "PRAGMA journal_mode=WAL").await?;
    pragma(&db, "PRAGMA synchronous=NORMAL").await?;

    Migrator::up(&db, None).await?;
    Ok(db)
}

async fn pragma(db: &DatabaseConnection, sql: &str) -> AppResult<()> {
    db.execute(Statement::from_string(db.get_database_backend(), sql.to_string())).await?;
    Ok(())
}
