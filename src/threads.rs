// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! A process-wide lock for hosts that touch the display from several
//! threads.
//!
//! The core never takes this lock itself. Code that calls into a display
//! from outside the thread running its main loop holds it around the call.

use once_cell::sync::Lazy;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

static LOCK: Lazy<ReentrantMutex<()>> = Lazy::new(|| ReentrantMutex::new(()));

/// Proof that the current thread holds the display lock.
///
/// The lock is released when the guard is dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ThreadsGuard {
    _guard: ReentrantMutexGuard<'static, ()>,
}

/// Takes the display lock, blocking until it is available.
///
/// The lock is re-entrant: a thread that already holds it may enter again.
pub fn threads_enter() -> ThreadsGuard {
    ThreadsGuard {
        _guard: LOCK.lock(),
    }
}

/// Takes the display lock if no other thread holds it.
pub fn threads_try_enter() -> Option<ThreadsGuard> {
    LOCK.try_lock().map(|guard| ThreadsGuard { _guard: guard })
}

/// Releases the display lock taken by [`threads_enter`].
pub fn threads_leave(guard: ThreadsGuard) {
    drop(guard);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn lock_is_reentrant_and_exclusive() {
        let outer = threads_enter();
        let inner = threads_enter();

        let (tx, rx) = mpsc::channel();
        let other = thread::spawn(move || {
            tx.send(threads_try_enter().is_some()).unwrap();
        });
        assert!(!rx.recv().unwrap());
        other.join().unwrap();

        threads_leave(inner);
        threads_leave(outer);
        let other = thread::spawn(|| threads_try_enter().is_some());
        assert!(other.join().unwrap());
    }
}
