use uuid::Uuid;

use crate::intervention::InterventionStage;
use crate::models::{ChatMessage, EmotionLabel, EmotionReading, SensorConfiguration};
use crate::sensing::MoodSummary;
use crate::sensing::SensorKind;
use crate::tutor::{ChatMode, Explanation, ExplanationSection, SummaryStyle};

/// Everything the user can do from the shell.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellAction {
    ToggleSensor(SensorKind),
    SetSensors(SensorConfiguration),
    OpenAssistant,
    AcceptPrompt,
    DeclinePrompt,
    CloseAssistant,
    SendMessage(String),
    Intervene {
        mode: ChatMode,
        input: Option<String>,
    },
    SummarizeVideo {
        url: String,
        style: SummaryStyle,
    },
    Explain(String),
    NarrateSection(ExplanationSection),
    StopNarration,
    SetMuted(bool),
    ToggleMute,
    StartBreathing,
    StopBreathing,
    AddQuote(String),
    /// Zero-based index into the quote list.
    EditQuote {
        index: usize,
        text: String,
    },
    RemoveQuote(usize),
    ListQuotes,
    ShowMood,
    Shutdown,
}

/// A scheduled timer, tagged with the generation of the slot that armed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    Grace(u64),
    ConfirmTimeout(u64),
    Cooldown(u64),
    Breathing(u64),
}

/// Result of a background request, tagged with the session it belongs to.
#[derive(Debug)]
pub enum AsyncReply {
    Chat {
        session: Uuid,
        text: String,
    },
    Explanation {
        session: Uuid,
        topic: String,
        explanation: Explanation,
    },
    Mood(Result<MoodSummary, String>),
}

#[derive(Debug)]
pub enum CoordinatorEvent {
    Action(ShellAction),
    Timer(TimerFired),
    Reply(AsyncReply),
}

impl From<ShellAction> for CoordinatorEvent {
    fn from(action: ShellAction) -> Self {
        CoordinatorEvent::Action(action)
    }
}

/// Incremental changes for the shell to render.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorUpdate {
    Reading(EmotionReading),
    SensorsChanged(SensorConfiguration),
    StageChanged(InterventionStage),
    ConfirmPrompt { label: EmotionLabel, text: String },
    Message(ChatMessage),
    Explanation(Explanation),
    Mood(MoodSummary),
    BreathingStarted { quote: String, seconds: u64 },
    BreathingFinished,
    BreathingStopped,
    Quotes(Vec<String>),
    Notice(String),
}
