//! `SQLite` implementation of [`UnitOfWork`]: one transaction per unit.

use std::future::Future;

use sqlx::{Sqlite, SqlitePool, Transaction};

use hearth_app::ports::UnitOfWork;
use hearth_domain::error::HubError;

use crate::error::StorageError;

/// Hands out pool transactions as units of work.
///
/// Beginning waits for a free connection when the pool is exhausted, up to
/// the pool's acquire timeout.
#[derive(Clone)]
pub struct SqliteUnitOfWork {
    pool: SqlitePool,
}

impl SqliteUnitOfWork {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl UnitOfWork for SqliteUnitOfWork {
    type Work = Transaction<'static, Sqlite>;

    fn begin(&self) -> impl Future<Output = Result<Self::Work, HubError>> + Send {
        let pool = self.pool.clone();
        async move { Ok(pool.begin().await.map_err(StorageError::from)?) }
    }

    fn commit(&self, work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send {
        async move { Ok(work.commit().await.map_err(StorageError::from)?) }
    }

    fn rollback(&self, work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send {
        async move { Ok(work.rollback().await.map_err(StorageError::from)?) }
    }
}
