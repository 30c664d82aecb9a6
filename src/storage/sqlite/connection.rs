//! Shared connection handling for `SQLite` stores.

use crate::Result;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Acquires a mutex lock, recovering from poisoning.
///
/// A panic in an earlier critical section leaves the connection usable, so
/// the inner value is recovered and a warning logged.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Applies WAL journaling, NORMAL sync and a 5 second busy timeout.
///
/// Pragma results are ignored: `journal_mode` returns a row that would make
/// `execute_batch` fail, and in-memory databases refuse WAL.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(1));
        let clone = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = clone.lock().expect("lock");
            panic!("poison the mutex");
        })
        .join();

        assert!(mutex.is_poisoned());
        let guard = acquire_lock(&mutex);
        assert_eq!(*guard, 1);
    }
}
