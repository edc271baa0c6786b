use std::time::Duration;

use tokio::time::Instant;

use crate::models::EmotionLabel;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerState {
    pub last_emotion: Option<EmotionLabel>,
    /// Set between a trigger and the end of its cooldown.
    pub triggered: bool,
    pub cooldown_until: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub label: EmotionLabel,
    pub cooldown_until: Instant,
}

/// Turns the reading stream into at most one trigger per new actionable
/// emotion. The cooldown runs from the moment the trigger is emitted.
#[derive(Debug)]
pub struct TriggerDebouncer {
    state: TriggerState,
    cooldown: Duration,
}

impl TriggerDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: TriggerState::default(),
            cooldown,
        }
    }

    pub fn state(&self) -> &TriggerState {
        &self.state
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn observe(&mut self, label: EmotionLabel, now: Instant) -> Option<Trigger> {
        self.expire_if_due(now);

        let is_new = self.state.last_emotion != Some(label);
        let trigger = if label.is_actionable() && is_new && !self.state.triggered {
            let cooldown_until = now + self.cooldown;
            self.state.triggered = true;
            self.state.cooldown_until = Some(cooldown_until);
            Some(Trigger {
                label,
                cooldown_until,
            })
        } else {
            None
        };

        self.state.last_emotion = Some(label);
        trigger
    }

    /// Clears the flag once the cooldown deadline has passed.
    pub fn expire_if_due(&mut self, now: Instant) -> bool {
        match self.state.cooldown_until {
            Some(deadline) if self.state.triggered && now >= deadline => {
                self.end_cooldown();
                true
            }
            _ => false,
        }
    }

    /// Re-arms triggering immediately (manual open, user dismissal).
    pub fn end_cooldown(&mut self) {
        self.state.triggered = false;
        self.state.cooldown_until = None;
    }

    pub fn forget_last_emotion(&mut self) {
        self.state.last_emotion = None;
    }

    /// Full reset, used when every sensor is turned off.
    pub fn reset(&mut self) {
        self.state = TriggerState::default();
    }
}
