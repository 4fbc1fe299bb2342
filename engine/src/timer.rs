//! The Timer Manager (C3, §4.3): the `running → going_once → going_twice` countdown for whichever
//! player is currently live. Lives as a plain struct embedded in the per-auction coordinator's own
//! `select!` loop rather than as a separately spawned task, so there is never a second thread of
//! execution racing the coordinator for the right to declare a phase expired (§5).
//!
//! Deadlines are computed once, at arm time, as `Instant::now() + duration` — `tokio::time::sleep`
//! already does this internally, so a slow tick or a wall-clock jump cannot shorten or stretch the
//! effective wait.

use std::pin::Pin;
use std::time::{Duration, Instant};

use tokio::time::Sleep;

use crate::model::TimerPhase;

pub struct PhaseTimer {
    phase: Option<TimerPhase>,
    sleep: Option<Pin<Box<Sleep>>>,
    deadline: Option<Instant>,
    running_secs: u64,
    going_once_secs: u64,
    going_twice_secs: u64,
    bid_reset_secs: u64,
}

impl PhaseTimer {
    pub fn new(running_secs: u64, bid_reset_secs: u64, going_once_secs: u64, going_twice_secs: u64) -> Self {
        Self {
            phase: None,
            sleep: None,
            deadline: None,
            running_secs,
            going_once_secs,
            going_twice_secs,
            bid_reset_secs,
        }
    }

    fn arm(&mut self, phase: TimerPhase, duration: Duration) {
        self.phase = Some(phase);
        self.deadline = Some(Instant::now() + duration);
        self.sleep = Some(Box::pin(tokio::time::sleep(duration)));
    }

    /// A fatal invariant requires this to run before the owning auction leaves `live` (§4.3): "a
    /// timer must be fully disarmed before its owning auction transitions out of live."
    pub fn disarm(&mut self) {
        self.phase = None;
        self.deadline = None;
        self.sleep = None;
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    pub fn current_phase(&self) -> Option<TimerPhase> {
        self.phase
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Arms a fresh `running` phase: used when a new player goes live, and on `resume` (which
    /// does not reuse any remaining time from before the pause).
    pub fn arm_for_live_player(&mut self) {
        self.arm(TimerPhase::Running, Duration::from_secs(self.running_secs));
    }

    /// A bid was accepted: cancels whatever phase is in flight and restarts `running` with
    /// `bidResetTimer` seconds remaining (§4.3).
    pub fn reset_on_bid(&mut self) {
        self.arm(TimerPhase::Running, Duration::from_secs(self.bid_reset_secs));
    }

    /// Advances past the phase that just expired. Returns the newly armed phase, or `None` once
    /// `going_twice` itself has expired — at which point the timer is disarmed and the caller
    /// (Lifecycle Coordinator) declares the terminal sale/unsold outcome.
    pub fn advance(&mut self) -> Option<TimerPhase> {
        let next = match self.phase {
            Some(TimerPhase::Running) => Some((TimerPhase::GoingOnce, self.going_once_secs)),
            Some(TimerPhase::GoingOnce) => Some((TimerPhase::GoingTwice, self.going_twice_secs)),
            Some(TimerPhase::GoingTwice) | None => None,
        };
        match next {
            Some((phase, secs)) => {
                self.arm(phase, Duration::from_secs(secs));
                Some(phase)
            }
            None => {
                self.disarm();
                None
            }
        }
    }

    /// Resolves when the armed phase's deadline elapses. Pends forever while disarmed, so this
    /// can sit in an unconditional `select!` branch in the coordinator's loop without a guard.
    pub async fn tick(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().await,
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_walks_running_going_once_going_twice_then_disarms() {
        let mut timer = PhaseTimer::new(10, 5, 3, 3);
        timer.arm_for_live_player();
        assert_eq!(timer.current_phase(), Some(TimerPhase::Running));

        assert_eq!(timer.advance(), Some(TimerPhase::GoingOnce));
        assert_eq!(timer.advance(), Some(TimerPhase::GoingTwice));
        assert_eq!(timer.advance(), None);
        assert!(!timer.is_armed());
    }

    #[test]
    fn reset_on_bid_always_returns_to_running() {
        let mut timer = PhaseTimer::new(10, 5, 3, 3);
        timer.arm_for_live_player();
        timer.advance();
        assert_eq!(timer.current_phase(), Some(TimerPhase::GoingOnce));

        timer.reset_on_bid();
        assert_eq!(timer.current_phase(), Some(TimerPhase::Running));
    }

    #[test]
    fn disarm_clears_phase_and_deadline() {
        let mut timer = PhaseTimer::new(10, 5, 3, 3);
        timer.arm_for_live_player();
        timer.disarm();
        assert_eq!(timer.current_phase(), None);
        assert!(timer.remaining().is_none());
        assert!(!timer.is_armed());
    }
}
