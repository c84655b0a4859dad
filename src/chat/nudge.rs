//! Idle-user nudging
//!
//! Each connection carries at most one pending nudge. The timer is a
//! single slot: re-arming replaces the previous deadline, so overlapping
//! nudges cannot exist. The first nudge fires after a fixed five minutes
//! of silence; follow-ups use a random 60–300 second delay.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// Silence before the first nudge
const INITIAL_DELAY: Duration = Duration::from_secs(5 * 60);
/// Delay range between subsequent nudges, in seconds
const FOLLOWUP_RANGE: RangeInclusive<u64> = 60..=300;

/// Single-slot nudge deadline
pub struct NudgeTimer {
    deadline: Option<Instant>,
    initial_delay: Duration,
    followup_range: RangeInclusive<u64>,
}

impl NudgeTimer {
    pub fn new() -> Self {
        Self::with_delays(INITIAL_DELAY, FOLLOWUP_RANGE)
    }

    pub fn with_delays(initial_delay: Duration, followup_range: RangeInclusive<u64>) -> Self {
        Self {
            deadline: None,
            initial_delay,
            followup_range,
        }
    }

    /// (Re-)arm the initial deadline. Called on connect and on every
    /// inbound message; any pending nudge is replaced.
    pub fn arm_initial(&mut self) {
        self.deadline = Some(Instant::now() + self.initial_delay);
    }

    /// Arm the jittered follow-up deadline after a nudge has fired.
    pub fn arm_followup(&mut self) {
        let seconds = rand::thread_rng().gen_range(self.followup_range.clone());
        self.deadline = Some(Instant::now() + Duration::from_secs(seconds));
    }

    /// Drop any pending nudge (disconnect).
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// The current deadline, if armed. The connection loop selects on
    /// [`idle_deadline`] with this value and calls [`Self::arm_followup`]
    /// after handling the fire.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for NudgeTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve at `deadline`, or never when disarmed.
pub async fn idle_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
