use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emotion labels as reported by the sensing backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum EmotionLabel {
    Happy,
    Confused,
    Frustrated,
    Sleepy,
    Bored,
    Engaged,
    Unknown,
    FaceNotDetected,
}

impl Default for EmotionLabel {
    fn default() -> Self {
        EmotionLabel::Unknown
    }
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 8] = [
        EmotionLabel::Happy,
        EmotionLabel::Confused,
        EmotionLabel::Frustrated,
        EmotionLabel::Sleepy,
        EmotionLabel::Bored,
        EmotionLabel::Engaged,
        EmotionLabel::Unknown,
        EmotionLabel::FaceNotDetected,
    ];

    /// Parses the backend's wire string. Anything unrecognised is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Happy" => EmotionLabel::Happy,
            "Confused" => EmotionLabel::Confused,
            "Frustrated" => EmotionLabel::Frustrated,
            "Sleepy" => EmotionLabel::Sleepy,
            "Bored" => EmotionLabel::Bored,
            "Engaged" => EmotionLabel::Engaged,
            "Face Not Detected" => EmotionLabel::FaceNotDetected,
            _ => EmotionLabel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "Happy",
            EmotionLabel::Confused => "Confused",
            EmotionLabel::Frustrated => "Frustrated",
            EmotionLabel::Sleepy => "Sleepy",
            EmotionLabel::Bored => "Bored",
            EmotionLabel::Engaged => "Engaged",
            EmotionLabel::Unknown => "Unknown",
            EmotionLabel::FaceNotDetected => "Face Not Detected",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "😊",
            EmotionLabel::Confused => "🤔",
            EmotionLabel::Frustrated => "😫",
            EmotionLabel::Sleepy => "💤",
            EmotionLabel::Bored => "😐",
            EmotionLabel::Engaged => "🎯",
            EmotionLabel::Unknown => "❓",
            EmotionLabel::FaceNotDetected => "👤",
        }
    }

    /// Negative emotions that may start an intervention.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            EmotionLabel::Confused
                | EmotionLabel::Frustrated
                | EmotionLabel::Sleepy
                | EmotionLabel::Bored
        )
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which remote emotion source produced a reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EndpointKind {
    Interaction,
    Facial,
    Voice,
    Combined,
    /// Latest persisted record, used as the fallback source.
    Latest,
    /// Neither the primary nor the fallback source answered.
    Unavailable,
}

impl EndpointKind {
    pub fn path(&self) -> Option<&'static str> {
        match self {
            EndpointKind::Interaction => Some("/api/emotion/interaction"),
            EndpointKind::Facial => Some("/api/emotion/facial"),
            EndpointKind::Voice => Some("/api/emotion/voice"),
            EndpointKind::Combined => Some("/api/emotion/combined"),
            EndpointKind::Latest => Some("/api/emotion/latest"),
            EndpointKind::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfiguration {
    pub camera_on: bool,
    pub mic_on: bool,
}

impl SensorConfiguration {
    pub fn new(camera_on: bool, mic_on: bool) -> Self {
        Self { camera_on, mic_on }
    }

    /// No sensor is enabled, so nothing may be polled.
    pub fn is_suspended(&self) -> bool {
        !self.camera_on && !self.mic_on
    }

    pub fn endpoint(&self) -> EndpointKind {
        match (self.camera_on, self.mic_on) {
            (false, false) => EndpointKind::Interaction,
            (true, false) => EndpointKind::Facial,
            (false, true) => EndpointKind::Voice,
            (true, true) => EndpointKind::Combined,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionReading {
    pub label: EmotionLabel,
    pub source: EndpointKind,
    pub observed_at: DateTime<Utc>,
}

impl EmotionReading {
    pub fn new(label: EmotionLabel, source: EndpointKind) -> Self {
        Self {
            label,
            source,
            observed_at: Utc::now(),
        }
    }
}
