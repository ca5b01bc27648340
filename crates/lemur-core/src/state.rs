use crate::types::State;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide switch gating whether runs may act.
///
/// Reads are not cached: a `set` is observed by the next run that calls `get`.
#[derive(Debug)]
pub struct RunState {
    stopped: AtomicBool,
}

impl RunState {
    pub fn new(initial: State) -> Self {
        Self {
            stopped: AtomicBool::new(initial == State::Stopped),
        }
    }

    pub fn get(&self) -> State {
        if self.stopped.load(Ordering::SeqCst) {
            State::Stopped
        } else {
            State::Started
        }
    }

    /// Set the state, returning the previous value.
    pub fn set(&self, state: State) -> State {
        let was_stopped = self
            .stopped
            .swap(state == State::Stopped, Ordering::SeqCst);
        if was_stopped {
            State::Stopped
        } else {
            State::Started
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(State::Started)
    }
}
