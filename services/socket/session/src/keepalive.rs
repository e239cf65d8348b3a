//! Heartbeat scheduling.
//!
//! The timer is a single owned handle with explicit arm/disarm transitions.
//! Its first tick completes immediately, so arming it on open yields the
//! heartbeat that must go out before any caller traffic.

use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

use socket_wire::Envelope;

/// Repeating heartbeat timer owned by a session
#[derive(Debug, Default)]
pub struct HeartbeatTimer {
    interval: Option<Interval>,
}

impl HeartbeatTimer {
    /// A timer that never fires until armed
    pub fn disarmed() -> Self {
        Self { interval: None }
    }

    /// Arm the timer. Replaces any previous schedule, so at most one is active.
    ///
    /// `period` must be non-zero; sessions refuse to open with a zero interval.
    pub fn arm(&mut self, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(ticker);
    }

    /// Disarm the timer. Safe to call repeatedly.
    pub fn disarm(&mut self) {
        self.interval = None;
    }

    /// Whether a schedule is active
    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Wait for the next firing. Pends forever while disarmed.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// Build the heartbeat envelope sent on every tick
pub fn build_heartbeat(instance_id: Option<&str>) -> Envelope {
    Envelope::heartbeat().with_instance_id(instance_id)
}
