//! # Save Gate
//!
//! At most one save runs at a time. A second caller of [`SaveGate::begin`]
//! blocks on a condition variable until the running save finishes.
//!
//! A save can only be ended through the [`SaveGuard`] that started it, either
//! by [`SaveGuard::finish`] or by dropping it. Nobody else can end a save in
//! progress.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

#[derive(Debug, Default)]
struct GateState {
    saving: bool,
    generation: u64,
}

/// Serialization point for saves.
#[derive(Debug, Default)]
pub struct SaveGate {
    state: Mutex<GateState>,
    done: Condvar,
}

impl SaveGate {
    /// Creates an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for any running save to finish, then starts a new one.
    #[must_use = "the save ends when the guard is dropped"]
    pub fn begin(self: &Arc<Self>) -> SaveGuard {
        let mut state = self.state.lock();
        if state.saving {
            debug!(generation = state.generation, "waiting for previous save");
        }
        while state.saving {
            self.done.wait(&mut state);
        }
        state.saving = true;
        state.generation += 1;
        SaveGuard {
            gate: Arc::clone(self),
            generation: state.generation,
        }
    }

    /// Like [`SaveGate::begin`], giving up after `timeout`.
    #[must_use]
    pub fn try_begin_for(self: &Arc<Self>, timeout: Duration) -> Option<SaveGuard> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.saving {
            if self.done.wait_until(&mut state, deadline).timed_out() && state.saving {
                return None;
            }
        }
        state.saving = true;
        state.generation += 1;
        Some(SaveGuard {
            gate: Arc::clone(self),
            generation: state.generation,
        })
    }

    fn finish_generation(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.saving && state.generation == generation {
            state.saving = false;
            self.done.notify_all();
        }
    }

    /// Returns true while a save is running.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.state.lock().saving
    }

    /// Number of saves started so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

/// A running save. Dropping it finishes the save.
#[derive(Debug)]
pub struct SaveGuard {
    gate: Arc<SaveGate>,
    generation: u64,
}

impl SaveGuard {
    /// Which save this is, counting from 1.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Ends the save, waking one waiting caller of [`SaveGate::begin`].
    pub fn finish(self) {
        drop(self);
    }
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        self.gate.finish_generation(self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_second_begin_waits() {
        let gate = Arc::new(SaveGate::new());
        let first = gate.begin();
        assert!(gate.is_saving());
        assert!(gate.try_begin_for(Duration::from_millis(20)).is_none());

        drop(first);
        assert!(!gate.is_saving());
        let second = gate.try_begin_for(Duration::from_millis(20)).unwrap();
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn test_new_gate_is_idle() {
        let gate = SaveGate::new();
        assert!(!gate.is_saving());
        assert_eq!(gate.generation(), 0);
    }

    #[test]
    fn test_finish_releases_waiter() {
        let gate = Arc::new(SaveGate::new());
        let first = gate.begin();
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.begin().generation())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        first.finish();
        assert_eq!(waiter.join().unwrap(), 2);
        assert!(!gate.is_saving());
    }

    #[test]
    fn test_saves_never_overlap() {
        let gate = Arc::new(SaveGate::new());
        let active = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let active = Arc::clone(&active);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _guard = gate.begin();
                        assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0);
                        thread::sleep(Duration::from_micros(200));
                        active.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(gate.generation(), 40);
    }
}
