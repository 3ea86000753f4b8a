//! Classifies driver errors that warrant a reconnect or a retry.

use oxide_query::DriverError;

/// Message fragments of errors caused by a dropped connection.
const LOST_CONNECTION: &[&str] = &[
    "server has gone away",
    "no connection to the server",
    "lost connection",
    "is dead or not enabled",
    "error while sending",
    "decryption failed or bad record mac",
    "server closed the connection unexpectedly",
    "ssl connection has been closed unexpectedly",
    "error writing data to the connection",
    "resource deadlock avoided",
    "child connection forced to terminate due to client_idle_limit",
    "query_wait_timeout",
    "reset by peer",
    "physical connection is not usable",
    "tcp provider: error code 0x68",
    "packets out of order. expected",
    "adaptive server connection failed",
    "communication link failure",
    "connection is no longer usable",
    "login timeout expired",
    "connection refused",
    "running with the --read-only option so it cannot execute this statement",
    "the connection is broken and recovery is not possible",
    "ssl: connection timed out",
    "temporary failure in name resolution",
    "broken pipe",
    "could not connect to server",
    "could not translate host name",
    "ssl syscall error: eof detected",
    "connection timed out",
    "pool timed out",
    "attempted to communicate with a crashed background worker",
];

/// Message fragments of deadlocks and serialization failures.
const CONCURRENCY: &[&str] = &[
    "deadlock found when trying to get lock",
    "deadlock detected",
    "the database file is locked",
    "database is locked",
    "database table is locked",
    "a table in the database is locked",
    "has been chosen as the deadlock victim",
    "lock wait timeout exceeded; try restarting transaction",
    "wsrep detected deadlock/conflict and aborted the transaction. try restarting the transaction",
];

/// Returns true if `error` means the connection is gone.
#[must_use]
pub fn caused_by_lost_connection(error: &DriverError) -> bool {
    matches_any(&error.message, LOST_CONNECTION)
}

/// Returns true for deadlocks, lock timeouts and serialization failures.
#[must_use]
pub fn caused_by_concurrency_error(error: &DriverError) -> bool {
    // SQLSTATE 40001, SQLite BUSY/LOCKED, SQL Server 1205
    if matches!(error.code.as_deref(), Some("40001" | "5" | "6" | "1205")) {
        return true;
    }
    matches_any(&error.message, CONCURRENCY)
}

fn matches_any(message: &str, needles: &[&str]) -> bool {
    let message = message.to_lowercase();
    needles.iter().any(|needle| message.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_connection_messages() {
        assert!(caused_by_lost_connection(&DriverError::new(
            "SQLSTATE[HY000]: General error: 2006 MySQL server has gone away"
        )));
        assert!(caused_by_lost_connection(&DriverError::new(
            "error communicating with database: Broken pipe (os error 32)"
        )));
        assert!(!caused_by_lost_connection(&DriverError::new("no such table: users")));
    }

    #[test]
    fn test_concurrency_errors() {
        assert!(caused_by_concurrency_error(&DriverError::with_code(
            "40001",
            "could not serialize access"
        )));
        assert!(caused_by_concurrency_error(&DriverError::new("database is locked")));
        assert!(caused_by_concurrency_error(&DriverError::new(
            "Deadlock found when trying to get lock; try restarting transaction"
        )));
        assert!(!caused_by_concurrency_error(&DriverError::with_code(
            "2067",
            "UNIQUE constraint failed: users.email"
        )));
    }
}
