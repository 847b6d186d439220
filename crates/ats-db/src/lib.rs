//! # ats-db
//!
//! PostgreSQL persistence for the applicant tracking system.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgCandidateRepository`], the SQL implementation of
//!   [`CandidateRepository`]
//! - Embedded schema migrations (`migrations` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ats_db::{CandidateService, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/ats").await?;
//!     let service = CandidateService::new(Arc::new(db.candidates.clone()));
//!
//!     let page = service.list(Default::default(), Default::default()).await?;
//!     println!("{} candidates", page.total);
//!
//!     db.close().await;
//!     Ok(())
//! }
//! ```
pub mod candidates;
pub mod pool;
pub mod test_fixtures;

// Re-export core types
pub use ats_core::*;

pub use candidates::{PgCandidateRepository, DOCUMENT_CONSTRAINT, EMAIL_CONSTRAINT};
pub use pool::{create_pool, create_pool_with_config, PoolConfig};

use tracing::info;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Database handle bundling the pool and the candidate repository.
///
/// Opened explicitly at startup and closed on shutdown.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Candidate repository.
    pub candidates: PgCandidateRepository,
}

impl Database {
    /// Wrap an existing pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            candidates: PgCandidateRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with a custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        info!(
            subsystem = "database",
            component = "migrations",
            op = "run",
            "Database migrations applied"
        );
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Close every connection in the pool and wait for them to finish.
    pub async fn close(&self) {
        self.pool.close().await;
        info!(
            subsystem = "database",
            component = "pool",
            op = "close",
            "Database connection pool closed"
        );
    }
}
