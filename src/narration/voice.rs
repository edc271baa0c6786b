use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::speech::SpeechSynthesizer;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub language: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePreference {
    pub language: String,
    pub provider: String,
}

/// Language plus provider, then language alone, then nothing.
pub fn select_voice<'a>(voices: &'a [Voice], preference: &VoicePreference) -> Option<&'a Voice> {
    let speaks = |voice: &&Voice| voice.language.contains(&preference.language);
    voices
        .iter()
        .filter(speaks)
        .find(|voice| voice.name.contains(&preference.provider))
        .or_else(|| voices.iter().find(speaks))
}

/// Voice list fetched lazily from the synthesizer. An empty list is never
/// stored, so voices that load late are picked up on a later attempt.
#[derive(Debug, Clone, Default)]
pub struct VoiceCache {
    voices: Arc<Mutex<Vec<Voice>>>,
}

impl VoiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cached(&self) -> Vec<Voice> {
        match self.voices.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn resolve(
        &self,
        synth: &dyn SpeechSynthesizer,
        preference: &VoicePreference,
    ) -> Option<Voice> {
        let mut voices = self.cached();
        if voices.is_empty() {
            voices = match synth.voices().await {
                Ok(list) => list,
                Err(err) => {
                    log_warn!("listing voices failed: {err:#}");
                    Vec::new()
                }
            };
            if !voices.is_empty() {
                log_debug!("cached {} voices", voices.len());
                match self.voices.lock() {
                    Ok(mut guard) => *guard = voices.clone(),
                    Err(poisoned) => *poisoned.into_inner() = voices.clone(),
                }
            }
        }
        select_voice(&voices, preference).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSpeech;
    use std::time::Duration;

    fn english() -> VoicePreference {
        VoicePreference {
            language: "en".into(),
            provider: "Google".into(),
        }
    }

    #[test]
    fn prefers_the_provider_within_the_language() {
        let voices = vec![
            Voice::new("Google Deutsch", "de-DE"),
            Voice::new("Samantha", "en-US"),
            Voice::new("Google US English", "en-US"),
        ];
        assert_eq!(
            select_voice(&voices, &english()).map(|v| v.name.as_str()),
            Some("Google US English")
        );
    }

    #[test]
    fn falls_back_to_any_voice_in_the_language() {
        let voices = vec![Voice::new("Google Deutsch", "de-DE"), Voice::new("Daniel", "en-GB")];
        assert_eq!(
            select_voice(&voices, &english()).map(|v| v.name.as_str()),
            Some("Daniel")
        );
    }

    #[test]
    fn no_match_means_no_explicit_voice() {
        let voices = vec![Voice::new("Thomas", "fr-FR")];
        assert!(select_voice(&voices, &english()).is_none());
        assert!(select_voice(&[], &english()).is_none());
    }

    #[tokio::test]
    async fn empty_voice_list_is_not_cached() {
        let speech = FakeSpeech::new(Duration::from_millis(10));
        let cache = VoiceCache::new();

        assert!(cache.resolve(&speech, &english()).await.is_none());

        speech.set_voices(vec![Voice::new("Google UK English", "en-GB")]);
        let voice = cache.resolve(&speech, &english()).await;
        assert_eq!(voice.map(|v| v.name), Some("Google UK English".to_string()));
        assert_eq!(speech.voice_queries(), 2);

        cache.resolve(&speech, &english()).await;
        assert_eq!(speech.voice_queries(), 2);
    }
}
