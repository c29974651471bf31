//! Cancellable pre-alert countdown.
//!
//! Modelled as a small state machine with forward-only transitions so the
//! one-shot completion cannot race a cancellation: a late timer tick that
//! arrives after `cancel()` (or after completion already fired) is ignored.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Countdown {
    #[default]
    Idle,
    Running {
        remaining: u32,
    },
    Cancelled,
    Completed,
}

/// Outcome of feeding one timer tick into the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Still counting; another tick should be scheduled.
    Running { remaining: u32 },
    /// The countdown just reached zero. Reported exactly once per episode.
    Completed,
    /// The machine is not running; the tick was a stale callback.
    Ignored,
}

impl Countdown {
    /// Begins a new episode. Rejected while an episode is still counting;
    /// terminal states from a previous episode are fine to restart from.
    pub fn start(&mut self, seconds: u32) -> Result<(), CountdownError> {
        match self {
            Self::Running { .. } => Err(CountdownError::AlreadyRunning),
            _ if seconds == 0 => Err(CountdownError::ZeroDuration),
            _ => {
                *self = Self::Running { remaining: seconds };
                Ok(())
            }
        }
    }

    /// Consumes one elapsed second. Only a `Running` machine reacts; the
    /// transition to `Completed` happens exactly once.
    pub fn tick(&mut self) -> Tick {
        match *self {
            Self::Running { remaining } => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    *self = Self::Completed;
                    Tick::Completed
                } else {
                    *self = Self::Running { remaining };
                    Tick::Running { remaining }
                }
            }
            _ => Tick::Ignored,
        }
    }

    /// Short-circuits a running countdown. Returns whether anything was
    /// actually cancelled; terminal and idle states are left untouched.
    pub fn cancel(&mut self) -> bool {
        if matches!(self, Self::Running { .. }) {
            *self = Self::Cancelled;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    #[must_use]
    pub const fn remaining(&self) -> Option<u32> {
        match self {
            Self::Running { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CountdownError {
    #[error("a countdown is already running")]
    AlreadyRunning,
    #[error("countdown duration must be at least one second")]
    ZeroDuration,
}
