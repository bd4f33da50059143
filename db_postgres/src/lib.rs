// diesel-async postgres implementation of the repository and priority queue ports

pub mod helpers;
pub mod schema;

mod game_repo;
mod match_repo;
mod program_repo;
mod queue_repo;
mod rating_repo;
mod team_repo;
mod tournament_repo;

pub use helpers::*;
pub use queue_repo::PgPriorityQueue;

use anyhow::{Context, Result, anyhow};
use app_core::ports::DbError;
use diesel::{dsl::sql, select, sql_types::Bool};
use diesel_async::{
    AsyncMigrationHarness, AsyncPgConnection, RunQueryDsl,
    pooled_connection::{
        AsyncDieselConnectionManager,
        bb8::{Pool, PooledConnection},
    },
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{info, instrument, warn};
use url::Url;

/// embed migrations
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Clone)]
pub struct PgDb {
    pool: Pool<AsyncPgConnection>,
}

impl PgDb {
    pub async fn new(database: Url) -> Result<Self> {
        let config = AsyncDieselConnectionManager::new(database);
        Ok(PgDb {
            pool: Pool::builder().build(config).await?,
        })
    }

    #[instrument(name = "db.migration", skip(self))]
    pub async fn run_migration(&self) -> Result<(), DbError> {
        let conn = self.pool.get_owned().await.map_err(|e| DbError::Other(e.into()))?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut harness = AsyncMigrationHarness::new(conn);
            harness
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| anyhow!("migration failed: {e}"))?;
            Ok(())
        })
        .await
        .context("join error while running migrations")?
        .map_err(DbError::Other)?;

        info!("migrations applied successfully");
        Ok(())
    }

    #[instrument(name = "db.conn.get", skip(self))]
    pub(crate) async fn new_connection(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, DbError> {
        match self.pool.get().await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                warn!(error = %e, "pool_get_failed");
                Err(DbError::Other(e.into()))
            }
        }
    }

    #[instrument(name = "db.ping", skip(self))]
    pub async fn ping(&self) -> Result<(), DbError> {
        let mut conn = self.new_connection().await?;
        select(sql::<Bool>("1=1"))
            .execute(&mut conn)
            .await
            .map_err(|e| DbError::Other(e.into()))?;
        Ok(())
    }
}

use diesel::result::{DatabaseErrorKind as K, Error as DE};

pub(crate) fn map_db_err(e: DE) -> DbError {
    match &e {
        DE::NotFound => DbError::NotFound,
        DE::DatabaseError(kind, info) => {
            let c = info.constraint_name().map(|s| s.to_string());
            match kind {
                K::UniqueViolation => DbError::UniqueViolation(c),
                K::ForeignKeyViolation => DbError::ForeignKeyViolation(c),
                K::CheckViolation => DbError::CheckViolation(c),
                K::SerializationFailure => DbError::SerializationFailure,
                _ => DbError::Other(anyhow::anyhow!(e)),
            }
        }
        _ => DbError::Other(anyhow::anyhow!(e)),
    }
}
