use sqlx::{Connection, Sqlite, SqliteConnection, SqlitePool, Transaction, pool::PoolConnection};

/// Where a batch writes.
///
/// Each owning entity is written inside its own unit (a transaction in commit
/// mode, a savepoint in dry-run mode), so a failure never leaves half of an
/// entity rewritten. A dry-run runs the exact same writes inside an outer
/// transaction that [`Session::finish`] rolls back.
pub enum Session {
    Commit(PoolConnection<Sqlite>),
    DryRun(Transaction<'static, Sqlite>),
}

impl Session {
    pub async fn begin(pool: &SqlitePool, dry_run: bool) -> Result<Self, sqlx::Error> {
        Ok(if dry_run {
            Session::DryRun(pool.begin().await?)
        } else {
            Session::Commit(pool.acquire().await?)
        })
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, Session::DryRun(_))
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        match self {
            Session::Commit(conn) => conn,
            Session::DryRun(tx) => tx,
        }
    }

    /// Starts the unit of work for one owning entity. Dropping it without
    /// `commit` undoes its writes.
    pub async fn unit(&mut self) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
        self.conn().begin().await
    }

    pub async fn finish(self) -> Result<(), sqlx::Error> {
        match self {
            Session::Commit(_) => Ok(()),
            Session::DryRun(tx) => tx.rollback().await,
        }
    }
}
