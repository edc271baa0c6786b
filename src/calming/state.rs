use std::cmp;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum BreathingStatus {
    #[default]
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BreathingState {
    pub status: BreathingStatus,
    pub quote: Option<String>,
    pub target_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub running_anchor: Option<Instant>,
}

impl BreathingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, quote: String, target_ms: u64, now: Instant) {
        *self = Self {
            status: BreathingStatus::Running,
            quote: Some(quote),
            target_ms,
            started_at: Some(Utc::now()),
            running_anchor: Some(now),
        };
    }

    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        match (self.status, self.running_anchor) {
            (BreathingStatus::Running, Some(anchor)) => {
                now.saturating_duration_since(anchor).as_millis() as u64
            }
            (BreathingStatus::Finished, _) => self.target_ms,
            _ => 0,
        }
    }

    pub fn remaining_ms(&self, now: Instant) -> u64 {
        match self.status {
            BreathingStatus::Running => {
                cmp::max(self.target_ms as i64 - self.elapsed_ms(now) as i64, 0) as u64
            }
            BreathingStatus::Idle | BreathingStatus::Finished => 0,
        }
    }

    /// Whole seconds left, rounded up the way a countdown is displayed.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        self.remaining_ms(now).div_ceil(1000)
    }

    pub fn finish(&mut self) {
        if self.status == BreathingStatus::Running {
            self.status = BreathingStatus::Finished;
            self.running_anchor = None;
        }
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.status == BreathingStatus::Running
    }
}
