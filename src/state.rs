//! Engine state shared between the foreground API and the refill handler.
//!
//! The state is a single atomic word. Writers never overlap: the foreground moves
//! idle/stopped sessions into `Playing` and requests `Playing -> Flushing`; the refill
//! handler performs `Playing -> Flushing` at end of stream and `Flushing -> Stopped`.
//! A condition variable lets the foreground sleep until a session has drained.

use crate::playback::PlayState;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Number of silence writes needed to push every byte already queued in the sink's
/// internal ring buffer out to the hardware, plus one.
pub fn flush_cycle_count(internal_buffer_len: usize, silence_buffer_len: usize) -> u32 {
    let cycles = internal_buffer_len.div_ceil(silence_buffer_len.max(1)) + 1;
    u32::try_from(cycles).unwrap_or(u32::MAX)
}

/// Lock a mutex, recovering the data if a panicking thread poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct EngineState {
    state: AtomicU8,
    settled_lock: Mutex<()>,
    settled: Condvar,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PlayState::Idle as u8),
            settled_lock: Mutex::new(()),
            settled: Condvar::new(),
        }
    }

    pub fn get(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True while samples or flush silence are still being delivered
    pub fn is_playing(&self) -> bool {
        self.get().is_active()
    }

    pub(crate) fn set(&self, state: PlayState) {
        let previous = PlayState::from_u8(self.state.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            log::debug!("Engine state {:?} -> {:?}", previous, state);
        }
        if !state.is_active() {
            self.notify_settled();
        }
    }

    /// Move from `from` to `to` only if the state is still `from`
    pub(crate) fn transition(&self, from: PlayState, to: PlayState) -> bool {
        let moved = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            log::debug!("Engine state {:?} -> {:?}", from, to);
            if !to.is_active() {
                self.notify_settled();
            }
        }
        moved
    }

    /// Block until the state is neither `Playing` nor `Flushing`.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub(crate) fn wait_until_settled(&self, timeout: Duration) -> bool {
        let guard = lock(&self.settled_lock);
        let (_guard, result) = self
            .settled
            .wait_timeout_while(guard, timeout, |_| self.is_playing())
            .unwrap_or_else(PoisonError::into_inner);
        !result.timed_out() || !self.is_playing()
    }

    fn notify_settled(&self) {
        let _guard = lock(&self.settled_lock);
        self.settled.notify_all();
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}
