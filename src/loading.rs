//! Busy indicator and stuck detection.
//!
//! A *cycle* opens when a recolor request is issued and closes when the result
//! is painted, the request fails, painting fails, or the user forces a reset.
//! The indicator follows the cycle except that the recolor safety timeout may
//! hide it early while the cycle stays open.
//!
//! | from            | event                 | to           |
//! |-----------------|-----------------------|--------------|
//! | Idle            | begin                 | Pending      |
//! | Pending         | hide (safety timeout) | Idle (open)  |
//! | Idle (open)     | begin (clock restarts)| Pending      |
//! | Pending / Idle (open) | threshold passed | StuckPending |
//! | any             | resolve               | Idle         |

use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadingState {
    Idle,
    Pending,
    StuckPending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearReason {
    Rendered,
    Fallback,
    ApplyError,
    RequestFailed,
    ForceReset,
    Teardown,
}

pub struct LoadingMonitor {
    stuck_threshold: Duration,
    pending_since: Option<Instant>,
    indicator: bool,
    stuck: bool,
}

impl LoadingMonitor {
    pub fn new(stuck_threshold: Duration) -> Self {
        LoadingMonitor {
            stuck_threshold,
            pending_since: None,
            indicator: false,
            stuck: false,
        }
    }

    pub fn state(&self) -> LoadingState {
        if self.stuck {
            LoadingState::StuckPending
        } else if self.indicator && self.pending_since.is_some() {
            LoadingState::Pending
        } else {
            LoadingState::Idle
        }
    }

    pub fn is_stuck(&self) -> bool {
        self.stuck
    }

    #[cfg(test)]
    fn is_cycle_open(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Shows the indicator. Returns a fresh stuck deadline whenever the state
    /// enters `Pending` from `Idle`, including an open cycle whose indicator
    /// was hidden. Re-issuing while already pending keeps the original start.
    pub fn begin(&mut self, now: Instant) -> Option<Instant> {
        let already_pending = self.indicator && self.pending_since.is_some();
        self.indicator = true;
        if already_pending || self.stuck {
            return None;
        }
        self.pending_since = Some(now);
        Some(now + self.stuck_threshold)
    }

    pub fn hide_indicator(&mut self) {
        if self.indicator {
            log::info!("Busy indicator turned off by safety timeout");
        }
        self.indicator = false;
    }

    /// Closes the cycle. Returns false if there was nothing to close.
    pub fn resolve(&mut self, reason: ClearReason) -> bool {
        let was_open = self.pending_since.is_some() || self.indicator || self.stuck;
        self.pending_since = None;
        self.indicator = false;
        self.stuck = false;
        if was_open {
            log::debug!("Busy state cleared ({reason:?})");
        }
        was_open
    }

    /// Marks the cycle stuck once it has been open strictly longer than the
    /// threshold. Returns true on the transition.
    pub fn check_stuck(&mut self, now: Instant) -> bool {
        match self.pending_since {
            Some(since) if !self.stuck && now.duration_since(since) > self.stuck_threshold => {
                log::warn!(
                    "Loading has been pending for {:.1}s",
                    now.duration_since(since).as_secs_f32()
                );
                self.stuck = true;
                true
            }
            _ => false,
        }
    }
}
