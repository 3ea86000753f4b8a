//! Transaction state machine.
//!
//! Level 0 means no transaction. Going from 0 to 1 issues the real
//! `BEGIN`; deeper levels create savepoints named `trans<level>` when the
//! grammar supports them. Commit and rollback unwind one level, and only
//! the transition back to 0 issues the real `COMMIT` or `ROLLBACK`.

use oxide_query::{ConnectionInterface, DriverError, Error, Result};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::detect;

fn savepoint_name(level: u32) -> String {
    format!("trans{level}")
}

fn is_concurrency_error(error: &Error) -> bool {
    error.driver_error().is_some_and(detect::caused_by_concurrency_error)
}

fn is_lost_connection(error: &Error) -> bool {
    error.driver_error().is_some_and(detect::caused_by_lost_connection)
}

impl Connection {
    /// Runs `callback` inside a transaction.
    ///
    /// Commits when the callback returns `Ok` and rolls back when it
    /// returns `Err`. Deadlocks and serialization failures are retried up
    /// to `attempts` times in total. Nested calls use savepoints.
    ///
    /// # Errors
    ///
    /// Returns the callback's error, or the failure of the final attempt.
    pub fn transaction<T, F>(&self, mut callback: F, attempts: u32) -> Result<T>
    where
        F: FnMut(&Self) -> Result<T>,
    {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            self.begin_transaction()?;

            let value = match callback(self) {
                Ok(value) => value,
                Err(error) => {
                    self.handle_transaction_exception(error, attempt, attempts)?;
                    attempt += 1;
                    continue;
                }
            };

            if let Err(error) = self.commit_transaction() {
                self.handle_commit_transaction_exception(error, attempt, attempts)?;
                attempt += 1;
                continue;
            }

            return Ok(value);
        }
    }

    /// Rolls back to `level`, releasing every savepoint above it. Does
    /// nothing unless `level` is below the current level.
    ///
    /// # Errors
    ///
    /// Propagates the rollback failure. A lost connection resets the level
    /// to 0.
    pub fn rollback_to(&self, level: u32) -> Result<()> {
        let current = self.transactions.get();
        if level >= current {
            return Ok(());
        }

        if let Err(error) = self.perform_rollback(level) {
            if is_lost_connection(&error) {
                self.transactions.set(0);
            }
            return Err(error);
        }

        self.transactions.set(level);
        debug!(connection = %self.name(), level, "Rolled back transaction");
        Ok(())
    }

    pub(crate) fn open_transaction(&self) -> Result<()> {
        self.create_transaction()?;
        self.transactions.set(self.transactions.get() + 1);
        debug!(connection = %self.name(), level = self.transactions.get(), "Began transaction");
        Ok(())
    }

    pub(crate) fn commit_transaction(&self) -> Result<()> {
        let level = self.transactions.get();
        if level == 1 && !self.pretending.get() {
            self.with_driver(false, |driver| driver.commit())
                .map_err(|error| self.query_error("COMMIT", &[], error))?;
        }
        self.transactions.set(level.saturating_sub(1));
        debug!(connection = %self.name(), level = self.transactions.get(), "Committed transaction");
        Ok(())
    }

    fn create_transaction(&self) -> Result<()> {
        let level = self.transactions.get();
        if level == 0 {
            if self.pretending.get() {
                return Ok(());
            }
            self.reconnect_if_missing_connection()?;
            if let Err(error) = self.with_driver(false, |driver| driver.begin()) {
                self.handle_begin_transaction_exception(error)?;
            }
        } else if self.grammar().supports_savepoints() {
            let sql = self.grammar().compile_savepoint(&savepoint_name(level + 1));
            self.exec_on_write(&sql)?;
        }
        Ok(())
    }

    /// Reconnects and begins again once if `BEGIN` hit a lost connection.
    fn handle_begin_transaction_exception(&self, error: DriverError) -> Result<()> {
        if !detect::caused_by_lost_connection(&error) {
            return Err(self.query_error("BEGIN", &[], error));
        }
        warn!(connection = %self.name(), error = %error, "Lost connection while beginning transaction, reconnecting");
        self.reconnect()?;
        self.with_driver(false, |driver| driver.begin())
            .map_err(|error| self.query_error("BEGIN", &[], error))
    }

    fn perform_rollback(&self, level: u32) -> Result<()> {
        if level == 0 {
            if self.pretending.get() {
                return Ok(());
            }
            self.with_driver(false, |driver| driver.roll_back())
                .map_err(|error| self.query_error("ROLLBACK", &[], error))
        } else if self.grammar().supports_savepoints() {
            let sql = self
                .grammar()
                .compile_savepoint_rollback(&savepoint_name(level + 1));
            self.exec_on_write(&sql)
        } else {
            Ok(())
        }
    }

    /// Rolls back after a failed callback. `Ok` means try again.
    fn handle_transaction_exception(&self, error: Error, attempt: u32, attempts: u32) -> Result<()> {
        let concurrency = is_concurrency_error(&error);

        // The outer transaction owns the retry.
        if concurrency && self.transactions.get() > 1 {
            self.transactions.set(self.transactions.get() - 1);
            return Err(error);
        }

        self.rollback()?;

        if concurrency && attempt < attempts {
            warn!(connection = %self.name(), attempt, error = %error, "Retrying transaction");
            return Ok(());
        }
        Err(error)
    }

    /// Unwinds the level after a failed commit. `Ok` means try again.
    fn handle_commit_transaction_exception(&self, error: Error, attempt: u32, attempts: u32) -> Result<()> {
        self.transactions.set(self.transactions.get().saturating_sub(1));

        if is_concurrency_error(&error) && attempt < attempts {
            warn!(connection = %self.name(), attempt, error = %error, "Retrying transaction after failed commit");
            return Ok(());
        }
        if is_lost_connection(&error) {
            self.transactions.set(0);
        }
        Err(error)
    }
}
