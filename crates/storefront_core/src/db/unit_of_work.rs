//! Request-scoped transaction handling.
//!
//! # Responsibility
//! - Give every lifecycle operation one explicit transaction object.
//! - Release it deterministically: commit on success, rollback on drop.
//!
//! # Invariants
//! - `UnitOfWork` uses `BEGIN IMMEDIATE`, so the write lock is held from the
//!   first statement and concurrent writers serialize at begin time.
//! - Nested repository writes reuse an already open transaction instead of
//!   failing on `BEGIN` inside `BEGIN`.

use super::DbResult;
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// One atomic unit of work against the store.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] rolls back
/// every statement executed through it.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    guard: RollbackGuard,
}

impl<'conn> UnitOfWork<'conn> {
    /// Starts an immediate transaction labelled with `operation` for logs.
    pub fn begin(conn: &'conn mut Connection, operation: &'static str) -> DbResult<Self> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        debug!("event=uow_begin module=db status=ok operation={operation}");
        Ok(Self {
            tx,
            guard: RollbackGuard {
                operation,
                started_at: Instant::now(),
                armed: true,
            },
        })
    }

    /// Connection view bound to this transaction.
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    /// Commits all statements executed through this unit of work.
    pub fn commit(self) -> DbResult<()> {
        let Self { tx, mut guard } = self;
        tx.commit()?;
        guard.armed = false;
        debug!(
            "event=uow_commit module=db status=ok operation={} duration_ms={}",
            guard.operation,
            guard.started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

struct RollbackGuard {
    operation: &'static str,
    started_at: Instant,
    armed: bool,
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                "event=uow_rollback module=db status=rollback operation={} duration_ms={}",
                self.operation,
                self.started_at.elapsed().as_millis()
            );
        }
    }
}

/// Runs `f` atomically on a shared connection.
///
/// Opens an immediate transaction when `conn` is in autocommit mode, and
/// runs `f` directly inside the caller's transaction otherwise.
pub fn within_transaction<T, E>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    if !conn.is_autocommit() {
        return f(conn);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
