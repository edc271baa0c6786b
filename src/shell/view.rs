use tokio::time::Instant;

use crate::coordinator::{CoordinatorSnapshot, CoordinatorUpdate};
use crate::intervention::InterventionStage;
use crate::models::{ChatRole, SensorConfiguration};
use crate::narration::NarrationSnapshot;
use crate::sensing::MoodSummary;
use crate::tutor::Explanation;

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn sensors(config: &SensorConfiguration) -> String {
    format!(
        "camera {} / mic {} ({:?})",
        on_off(config.camera_on),
        on_off(config.mic_on),
        config.endpoint()
    )
}

/// Text for one coordinator update, or `None` when nothing needs printing.
///
/// Assistant messages are skipped here; they appear through the narration
/// reveal instead.
pub fn render_update(update: &CoordinatorUpdate) -> Option<String> {
    let line = match update {
        CoordinatorUpdate::Reading(reading) => format!(
            "{} {} [{:?}]",
            reading.label.emoji(),
            reading.label,
            reading.source
        ),
        CoordinatorUpdate::SensorsChanged(config) => format!("sensors: {}", sensors(config)),
        CoordinatorUpdate::StageChanged(stage) => match stage {
            InterventionStage::Idle => "assistant closed".to_string(),
            InterventionStage::Confirming => return None,
            InterventionStage::Active => "assistant open".to_string(),
        },
        CoordinatorUpdate::ConfirmPrompt { label, text } => {
            format!("{} {text} (yes/no)", label.emoji())
        }
        CoordinatorUpdate::Message(message) => match message.role {
            ChatRole::User => format!("you: {}", message.text),
            ChatRole::Assistant => return None,
        },
        CoordinatorUpdate::Explanation(explanation) => render_explanation(explanation),
        CoordinatorUpdate::Mood(summary) => render_mood(summary),
        CoordinatorUpdate::BreathingStarted { quote, seconds } => {
            format!("breathe with me for {seconds}s\n  \"{quote}\"")
        }
        CoordinatorUpdate::BreathingFinished => "breathing exercise complete".to_string(),
        CoordinatorUpdate::BreathingStopped => "breathing exercise stopped".to_string(),
        CoordinatorUpdate::Quotes(quotes) if quotes.is_empty() => "no calming quotes".to_string(),
        CoordinatorUpdate::Quotes(quotes) => quotes
            .iter()
            .enumerate()
            .map(|(index, quote)| format!("{}. {quote}", index + 1))
            .collect::<Vec<_>>()
            .join("\n"),
        CoordinatorUpdate::Notice(text) => format!("! {text}"),
    };
    Some(line)
}

fn render_explanation(explanation: &Explanation) -> String {
    let mut out = format!("== {} ==", explanation.title);
    if !explanation.key_concepts.is_empty() {
        out.push_str(&format!("\nkey concepts: {}", explanation.key_concepts.join(", ")));
    }
    for example in &explanation.examples {
        out.push_str(&format!("\n-- {} --\n{}", example.title, example.code));
    }
    for (step, item) in explanation.learning_path.iter().enumerate() {
        out.push_str(&format!("\n{}. {item}", step + 1));
    }
    out
}

fn render_mood(summary: &MoodSummary) -> String {
    let Some(dominant) = summary.dominant else {
        return "no mood history yet".to_string();
    };
    let counts = summary
        .counts
        .iter()
        .map(|(label, count)| format!("{label} x{count}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("mostly {} {dominant} ({counts})", dominant.emoji())
}

pub fn render_status(snapshot: &CoordinatorSnapshot) -> String {
    let mut lines = vec![
        format!("stage: {:?}", snapshot.stage()),
        format!("sensors: {}", sensors(&snapshot.sensors)),
    ];
    if let Some(reading) = &snapshot.last_reading {
        lines.push(format!("last reading: {} {}", reading.label.emoji(), reading.label));
    }
    if snapshot.trigger.triggered {
        lines.push("trigger cooling down".to_string());
    }
    if let Some(session) = &snapshot.session {
        lines.push(format!(
            "session {} ({} messages)",
            session.id,
            snapshot.transcript.len()
        ));
    }
    if snapshot.breathing.is_running() {
        lines.push(format!(
            "breathing: {}s left",
            snapshot.breathing.remaining_secs(Instant::now())
        ));
    }
    if snapshot.pending_requests > 0 {
        lines.push(format!("waiting on {} request(s)", snapshot.pending_requests));
    }
    lines.join("\n")
}

/// Tracks how much of the live narration has been printed so the reveal
/// can be streamed to a terminal.
#[derive(Debug, Default)]
pub struct RevealPrinter {
    section_id: Option<String>,
    text: String,
    printed: usize,
}

impl RevealPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the text to write for `snapshot`: a fresh line when the job
    /// changed, then any newly revealed characters.
    pub fn advance(&mut self, snapshot: &NarrationSnapshot) -> String {
        let mut out = String::new();
        if snapshot.section_id != self.section_id || snapshot.text != self.text {
            if self.printed > 0 {
                out.push('\n');
            }
            self.section_id = snapshot.section_id.clone();
            self.text = snapshot.text.clone();
            self.printed = 0;
            if self.section_id.is_none() {
                return out;
            }
            out.push_str("tutor: ");
        }

        if snapshot.revealed > self.printed {
            out.extend(
                snapshot
                    .text
                    .chars()
                    .skip(self.printed)
                    .take(snapshot.revealed - self.printed),
            );
            self.printed = snapshot.revealed;
            if snapshot.is_complete() {
                out.push('\n');
            }
        }
        out
    }
}
