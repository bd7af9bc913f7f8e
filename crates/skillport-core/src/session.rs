//! Process-wide session state.
//!
//! One process run = one session: a UUID plus an install counter used by
//! the auto-install policy. Initialized on first use; never shared across
//! processes. Tests can reset it.

use std::sync::Mutex;

struct SessionState {
    id: String,
    install_count: u32,
}

static SESSION: Mutex<Option<SessionState>> = Mutex::new(None);

fn with_session<T>(f: impl FnOnce(&mut SessionState) -> T) -> T {
    let mut guard = SESSION.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let state = guard.get_or_insert_with(|| SessionState {
        id: uuid::Uuid::new_v4().to_string(),
        install_count: 0,
    });
    f(state)
}

/// Session UUID, stable for the lifetime of the process.
pub fn session_id() -> String {
    with_session(|s| s.id.clone())
}

/// Number of installs performed so far in this session.
pub fn install_count() -> u32 {
    with_session(|s| s.install_count)
}

/// Record a completed install; returns the new count.
pub fn record_install() -> u32 {
    with_session(|s| {
        s.install_count += 1;
        s.install_count
    })
}

/// Drop all session state so the next access starts fresh.
pub fn reset_for_tests() {
    let mut guard = SESSION.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        reset_for_tests();
        let id = session_id();
        assert_eq!(id, session_id());
        assert_eq!(install_count(), 0);
        assert_eq!(record_install(), 1);
        assert_eq!(record_install(), 2);
        assert_eq!(install_count(), 2);

        reset_for_tests();
        assert_ne!(session_id(), id);
        assert_eq!(install_count(), 0);
    }
}
