use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::EmotionLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InterventionStage {
    #[default]
    Idle,
    Confirming,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "label")]
pub enum SessionOrigin {
    Emotion(EmotionLabel),
    Manual,
}

impl SessionOrigin {
    pub fn label(&self) -> Option<EmotionLabel> {
        match self {
            SessionOrigin::Emotion(label) => Some(*label),
            SessionOrigin::Manual => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub id: Uuid,
    pub origin: SessionOrigin,
    pub opened_at: DateTime<Utc>,
}

impl ActiveSession {
    fn open(origin: SessionOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            opened_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    /// `pending` holds a trigger waiting out its grace period.
    Idle { pending: Option<EmotionLabel> },
    Confirming { label: EmotionLabel },
    Active(ActiveSession),
}

/// The three-stage intervention lifecycle.
///
/// Transitions that do not apply to the current stage are rejected and leave
/// the machine untouched, so late timers and repeated closes are no-ops.
#[derive(Debug)]
pub struct InterventionMachine {
    phase: Phase,
}

impl Default for InterventionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InterventionMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle { pending: None },
        }
    }

    pub fn stage(&self) -> InterventionStage {
        match self.phase {
            Phase::Idle { .. } => InterventionStage::Idle,
            Phase::Confirming { .. } => InterventionStage::Confirming,
            Phase::Active(_) => InterventionStage::Active,
        }
    }

    pub fn session(&self) -> Option<&ActiveSession> {
        match &self.phase {
            Phase::Active(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_current_session(&self, id: Uuid) -> bool {
        self.session().map(|s| s.id == id).unwrap_or(false)
    }

    pub fn pending_label(&self) -> Option<EmotionLabel> {
        match self.phase {
            Phase::Idle { pending } => pending,
            _ => None,
        }
    }

    pub fn confirming_label(&self) -> Option<EmotionLabel> {
        match self.phase {
            Phase::Confirming { label } => Some(label),
            _ => None,
        }
    }

    /// Records a trigger whose popup is shown once the grace period ends.
    /// Only an idle machine without a pending trigger accepts it.
    pub fn begin_grace(&mut self, label: EmotionLabel) -> bool {
        match self.phase {
            Phase::Idle { pending: None } => {
                self.phase = Phase::Idle {
                    pending: Some(label),
                };
                true
            }
            _ => false,
        }
    }

    pub fn grace_elapsed(&mut self) -> Option<EmotionLabel> {
        match self.phase {
            Phase::Idle {
                pending: Some(label),
            } => {
                self.phase = Phase::Confirming { label };
                Some(label)
            }
            _ => None,
        }
    }

    pub fn accept(&mut self) -> Option<&ActiveSession> {
        let Phase::Confirming { label } = self.phase else {
            return None;
        };
        self.phase = Phase::Active(ActiveSession::open(SessionOrigin::Emotion(label)));
        self.session()
    }

    pub fn decline(&mut self) -> bool {
        self.dismiss_popup()
    }

    /// Silence counts as a decline.
    pub fn confirm_timed_out(&mut self) -> bool {
        self.dismiss_popup()
    }

    fn dismiss_popup(&mut self) -> bool {
        if matches!(self.phase, Phase::Confirming { .. }) {
            self.phase = Phase::Idle { pending: None };
            true
        } else {
            false
        }
    }

    /// Opens a session directly. A pending grace period or an open popup is
    /// superseded; an already active session is kept.
    pub fn open_manual(&mut self) -> Option<&ActiveSession> {
        if matches!(self.phase, Phase::Active(_)) {
            return None;
        }
        self.phase = Phase::Active(ActiveSession::open(SessionOrigin::Manual));
        self.session()
    }

    /// Returns the closed session, or `None` when already idle.
    pub fn close(&mut self) -> Option<ActiveSession> {
        match std::mem::replace(&mut self.phase, Phase::Idle { pending: None }) {
            Phase::Active(session) => Some(session),
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Drops a trigger still waiting out its grace period.
    pub fn cancel_pending(&mut self) -> bool {
        match self.phase {
            Phase::Idle { pending: Some(_) } => {
                self.phase = Phase::Idle { pending: None };
                true
            }
            _ => false,
        }
    }
}
