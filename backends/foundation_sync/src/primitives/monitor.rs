//! Monitor building blocks shared by the channel and the barrier.
//!
//! With std available we use `std::sync::{Condvar, Mutex}` directly. Poisoned
//! locks are recovered: no caller code ever runs while one of our monitor
//! locks is held, so a poisoned guard still protects a consistent state.

use std::sync::PoisonError;
use std::time::Instant;

pub(crate) use std::sync::{
    Condvar as CondVar, Mutex as CondVarMutex, MutexGuard as CondVarMutexGuard,
};

/// Acquires `mutex`, recovering the guard if the lock was poisoned.
pub(crate) fn lock<T>(mutex: &CondVarMutex<T>) -> CondVarMutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(recover)
}

/// Takes the guard out of a poisoned result, logging the recovery.
fn recover<G>(poisoned: PoisonError<G>) -> G {
    tracing::warn!("Recovering poisoned monitor lock");
    poisoned.into_inner()
}

/// Releases `guard` and blocks on `condvar` until woken, re-acquiring the lock.
///
/// Callers must re-check their predicate: wakes may be spurious or stale.
pub(crate) fn wait<'a, T>(
    condvar: &CondVar,
    guard: CondVarMutexGuard<'a, T>,
) -> CondVarMutexGuard<'a, T> {
    condvar.wait(guard).unwrap_or_else(recover)
}

/// Same as [`wait`] but gives up once `deadline` has passed.
///
/// Hands the guard back unchanged through `Err` when the deadline had already
/// expired, without waiting.
pub(crate) fn wait_until<'a, T>(
    condvar: &CondVar,
    guard: CondVarMutexGuard<'a, T>,
    deadline: Instant,
) -> Result<CondVarMutexGuard<'a, T>, CondVarMutexGuard<'a, T>> {
    let now = Instant::now();
    if now >= deadline {
        return Err(guard);
    }

    let (guard, _) = condvar
        .wait_timeout(guard, deadline - now)
        .unwrap_or_else(recover);
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tracing_test::traced_test;

    /// WHY: Validates poisoned locks do not propagate panics to later callers
    /// WHAT: `lock()` should return the guarded value after a holder panicked
    #[test]
    fn test_lock_recovers_from_poison() {
        let mutex = Arc::new(CondVarMutex::new(7u32));

        let mutex_clone = Arc::clone(&mutex);
        let result = thread::spawn(move || {
            let _guard = mutex_clone.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(result.is_err());
        assert!(mutex.is_poisoned());

        assert_eq!(*lock(&mutex), 7);
    }

    /// WHY: An expired deadline must not block at all
    /// WHAT: `wait_until` with a past deadline hands back the guard via Err
    #[test]
    fn test_wait_until_past_deadline() {
        let mutex = CondVarMutex::new(());
        let condvar = CondVar::new();

        let guard = lock(&mutex);
        let deadline = Instant::now();
        thread::sleep(Duration::from_millis(1));

        assert!(wait_until(&condvar, guard, deadline).is_err());
    }

    /// WHY: Every path that re-acquires a poisoned lock must report it
    /// WHAT: A timed wait on a poisoned mutex still returns the guard and logs a warning
    #[test]
    #[traced_test]
    fn test_wait_until_recovers_and_logs_poison() {
        let mutex = Arc::new(CondVarMutex::new(3u32));
        let condvar = CondVar::new();

        let mutex_clone = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = mutex_clone.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(mutex.is_poisoned());

        let guard = mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + Duration::from_millis(5);
        let guard = wait_until(&condvar, guard, deadline).expect("deadline still ahead");

        assert_eq!(*guard, 3);
        assert!(logs_contain("Recovering poisoned monitor lock"));
    }
}
