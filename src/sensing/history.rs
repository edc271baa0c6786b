use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::EmotionLabel;

pub const MOOD_WINDOW: usize = 10;

/// One persisted record from the sensing backend's emotion log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EmotionRecord {
    pub time: String,
    pub facial_emotion: Option<String>,
    pub voice_emotion: Option<String>,
    pub interaction_emotion: Option<String>,
    pub final_emotion: Option<String>,
    pub value: f64,
}

impl EmotionRecord {
    pub fn label(&self) -> EmotionLabel {
        self.final_emotion
            .as_deref()
            .map(EmotionLabel::parse)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MoodSummary {
    /// Labels of the most recent records, oldest first.
    pub recent: Vec<(String, EmotionLabel)>,
    pub counts: BTreeMap<EmotionLabel, usize>,
    pub dominant: Option<EmotionLabel>,
}

/// Summarises the last [`MOOD_WINDOW`] records. Ties for the dominant label
/// go to the most recent one.
pub fn summarize(records: &[EmotionRecord]) -> MoodSummary {
    let start = records.len().saturating_sub(MOOD_WINDOW);
    let window = &records[start..];

    let recent: Vec<(String, EmotionLabel)> = window
        .iter()
        .map(|record| (record.time.clone(), record.label()))
        .collect();

    let mut counts = BTreeMap::new();
    for (_, label) in &recent {
        *counts.entry(*label).or_insert(0usize) += 1;
    }

    // max_by_key keeps the last maximum, i.e. the most recent label.
    let dominant = recent
        .iter()
        .map(|(_, label)| *label)
        .max_by_key(|label| counts.get(label).copied().unwrap_or(0));

    MoodSummary {
        recent,
        counts,
        dominant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: &str, label: &str) -> EmotionRecord {
        EmotionRecord {
            time: time.into(),
            final_emotion: Some(label.into()),
            ..EmotionRecord::default()
        }
    }

    #[test]
    fn keeps_only_the_last_ten_records() {
        let records: Vec<_> = (0..14)
            .map(|i| record(&format!("10:{i:02}"), if i < 4 { "Sleepy" } else { "Engaged" }))
            .collect();

        let summary = summarize(&records);
        assert_eq!(summary.recent.len(), MOOD_WINDOW);
        assert_eq!(summary.recent[0].0, "10:04");
        assert_eq!(summary.counts.get(&EmotionLabel::Sleepy), None);
        assert_eq!(summary.dominant, Some(EmotionLabel::Engaged));
    }

    #[test]
    fn ties_favour_the_most_recent_label() {
        let records = vec![
            record("1", "Confused"),
            record("2", "Happy"),
            record("3", "Confused"),
            record("4", "Happy"),
        ];
        assert_eq!(summarize(&records).dominant, Some(EmotionLabel::Happy));
    }

    #[test]
    fn missing_final_emotion_counts_as_unknown() {
        let records = vec![EmotionRecord::default()];
        let summary = summarize(&records);
        assert_eq!(summary.counts.get(&EmotionLabel::Unknown), Some(&1));
    }

    #[test]
    fn empty_history_has_no_dominant_label() {
        assert_eq!(summarize(&[]).dominant, None);
    }
}
