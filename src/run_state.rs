use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

/// How often [`ReadySignal::wait_or_stop`] looks again.
const READY_POLL: Duration = Duration::from_millis(10);

/// Where the session is in its life.
///
/// Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RunPhase {
    /// Loops keep going.
    Running = 0,

    /// Loops should finish their current iteration and return.
    StopRequested = 1,

    /// Everything has been torn down.
    Stopped = 2,
}

impl RunPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::StopRequested,
            _ => Self::Stopped,
        }
    }
}

impl Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Running => write!(f, "running"),
            RunPhase::StopRequested => write!(f, "stop requested"),
            RunPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// The shared stop/continue state.
///
/// Created once per session and cloned into whoever needs it.
#[derive(Debug, Clone)]
pub struct RunState(Arc<AtomicU8>);

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// A new state, [`RunPhase::Running`].
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RunPhase::Running as u8)))
    }

    /// The current phase.
    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Shorthand for the phase being [`RunPhase::Running`].
    pub fn is_running(&self) -> bool {
        self.phase() == RunPhase::Running
    }

    /// Ask everyone to stop.
    ///
    /// Returns whether this call was the one that moved the state out of running.
    pub fn request_stop(&self) -> bool {
        self.advance(RunPhase::StopRequested) == RunPhase::Running
    }

    /// Mark teardown as done.
    pub fn mark_stopped(&self) {
        self.advance(RunPhase::Stopped);
    }

    /// Move forward to `phase` unless already past it. Returns the previous phase.
    fn advance(&self, phase: RunPhase) -> RunPhase {
        RunPhase::from_u8(self.0.fetch_max(phase as u8, Ordering::AcqRel))
    }
}

/// Tells the receiving thread the display may be drawn on.
#[derive(Debug, Clone, Default)]
pub struct ReadySignal(Arc<AtomicBool>);

impl ReadySignal {
    /// Not yet ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// The display is up.
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`Self::signal`] was called.
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sleep in short steps until ready or until the run state leaves running.
    ///
    /// Returns `true` if ready, `false` if told to stop first.
    pub fn wait_or_stop(&self, run_state: &RunState) -> bool {
        loop {
            if !run_state.is_running() {
                return false;
            }
            if self.is_ready() {
                return true;
            }
            std::thread::sleep(READY_POLL);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn starts_running() {
        let state = RunState::new();

        assert!(state.is_running());
        assert_eq!(state.phase(), RunPhase::Running);
    }

    #[test]
    fn only_first_request_stops() {
        let state = RunState::new();
        let other = state.clone();

        assert!(state.request_stop());
        assert!(!other.request_stop());
        assert_eq!(other.phase(), RunPhase::StopRequested);
    }

    #[test]
    fn never_goes_back() {
        let state = RunState::new();

        state.mark_stopped();
        assert!(!state.request_stop());
        assert_eq!(state.phase(), RunPhase::Stopped);
    }

    #[test]
    fn ready_signal() {
        let state = RunState::new();
        let ready = ReadySignal::new();

        let waiter = {
            let state = state.clone();
            let ready = ready.clone();
            std::thread::spawn(move || ready.wait_or_stop(&state))
        };

        ready.signal();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn stop_while_waiting_for_ready() {
        let state = RunState::new();
        let ready = ReadySignal::new();

        let waiter = {
            let state = state.clone();
            let ready = ready.clone();
            std::thread::spawn(move || ready.wait_or_stop(&state))
        };

        state.request_stop();
        assert!(!waiter.join().unwrap());
        assert!(!ready.is_ready());
    }
}
