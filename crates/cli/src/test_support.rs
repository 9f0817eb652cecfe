//! Serialises tests that mutate the process environment.

use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Runs `body` while holding the process-wide environment lock.
pub(crate) fn with_locked_env<R>(body: impl FnOnce() -> R) -> R {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    body()
}

/// Call only inside [`with_locked_env`].
pub(crate) fn set_env_var(key: &str, value: &str) {
    // SAFETY: callers hold ENV_LOCK, so no other test reads or writes the environment concurrently.
    unsafe {
        std::env::set_var(key, value);
    }
}

/// Call only inside [`with_locked_env`].
pub(crate) fn remove_env_var(key: &str) {
    // SAFETY: see `set_env_var`.
    unsafe {
        std::env::remove_var(key);
    }
}
