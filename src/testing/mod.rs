//! In-process stand-ins for the external collaborators, shared by unit and
//! integration tests.

#[cfg(test)]
mod http;

#[cfg(test)]
pub use http::StubHttpServer;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::coordinator::CoordinatorDeps;
use crate::models::{EmotionLabel, EndpointKind};
use crate::narration::{SpeechSynthesizer, Utterance, Voice};
use crate::sensing::{EmotionBackend, EmotionRecord, SensorKind};
use crate::tutor::{
    fallback_explanation, CompletionService, Explanation, ExplanationService, VideoInfo,
    VideoMetadataService,
};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Emotion backend answering every endpoint with one configurable label.
#[derive(Default)]
pub struct FakeEmotionBackend {
    label: Mutex<EmotionLabel>,
    failing: Mutex<HashSet<EndpointKind>>,
    calls: Mutex<Vec<EndpointKind>>,
    notifications: Mutex<Vec<(SensorKind, bool)>>,
    fail_notifications: AtomicBool,
    history: Mutex<Vec<EmotionRecord>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeEmotionBackend {
    pub fn new(label: EmotionLabel) -> Self {
        Self {
            label: Mutex::new(label),
            ..Self::default()
        }
    }

    pub fn set_label(&self, label: EmotionLabel) {
        *lock(&self.label) = label;
    }

    pub fn fail_endpoint(&self, endpoint: EndpointKind) {
        lock(&self.failing).insert(endpoint);
    }

    pub fn fail_notifications(&self) {
        self.fail_notifications.store(true, Ordering::SeqCst);
    }

    /// Every fetch sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub fn set_history(&self, records: Vec<EmotionRecord>) {
        *lock(&self.history) = records;
    }

    pub fn calls(&self) -> Vec<EndpointKind> {
        lock(&self.calls).clone()
    }

    pub fn notifications(&self) -> Vec<(SensorKind, bool)> {
        lock(&self.notifications).clone()
    }
}

#[async_trait]
impl EmotionBackend for FakeEmotionBackend {
    async fn fetch_label(&self, endpoint: EndpointKind) -> Result<EmotionLabel> {
        lock(&self.calls).push(endpoint);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if lock(&self.failing).contains(&endpoint) {
            bail!("{endpoint:?} unavailable");
        }
        Ok(*lock(&self.label))
    }

    async fn notify_sensor(&self, sensor: SensorKind, enabled: bool) -> Result<()> {
        lock(&self.notifications).push((sensor, enabled));
        if self.fail_notifications.load(Ordering::SeqCst) {
            bail!("sensor endpoint unreachable");
        }
        Ok(())
    }

    async fn emotion_history(&self) -> Result<Vec<EmotionRecord>> {
        Ok(lock(&self.history).clone())
    }
}

/// Speech synthesizer that "plays" each utterance for a fixed duration.
pub struct FakeSpeech {
    supported: bool,
    duration: Duration,
    voices: Mutex<Vec<Voice>>,
    voice_queries: AtomicUsize,
    spoken: Mutex<Vec<Utterance>>,
    cancelled: Arc<AtomicUsize>,
}

impl FakeSpeech {
    pub fn new(duration: Duration) -> Self {
        Self {
            supported: true,
            duration,
            voices: Mutex::new(Vec::new()),
            voice_queries: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
            cancelled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn set_voices(&self, voices: Vec<Voice>) {
        *lock(&self.voices) = voices;
    }

    pub fn voice_queries(&self) -> usize {
        self.voice_queries.load(Ordering::SeqCst)
    }

    pub fn spoken(&self) -> Vec<String> {
        lock(&self.spoken).iter().map(|u| u.text.clone()).collect()
    }

    pub fn voices_used(&self) -> Vec<Option<String>> {
        lock(&self.spoken)
            .iter()
            .map(|u| u.voice.as_ref().map(|v| v.name.clone()))
            .collect()
    }

    /// Utterances dropped before they finished playing.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct PlaybackGuard {
    cancelled: Arc<AtomicUsize>,
    finished: bool,
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn voices(&self) -> Result<Vec<Voice>> {
        self.voice_queries.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.voices).clone())
    }

    async fn speak(&self, utterance: Utterance, started: oneshot::Sender<()>) -> Result<()> {
        if !self.supported {
            bail!("speech synthesis is not available");
        }
        lock(&self.spoken).push(utterance);
        let mut guard = PlaybackGuard {
            cancelled: self.cancelled.clone(),
            finished: false,
        };
        let _ = started.send(());
        tokio::time::sleep(self.duration).await;
        guard.finished = true;
        Ok(())
    }
}

/// Completion service with a canned reply, recording every prompt.
pub struct FakeCompletion {
    reply: Option<String>,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
        lock(&self.prompts).push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("completion service unavailable"))
    }
}

pub struct FakeVideoMetadata {
    info: Option<VideoInfo>,
}

impl FakeVideoMetadata {
    pub fn returning(info: VideoInfo) -> Self {
        Self { info: Some(info) }
    }

    pub fn failing() -> Self {
        Self { info: None }
    }
}

#[async_trait]
impl VideoMetadataService for FakeVideoMetadata {
    async fn lookup(&self, video_id: &str) -> Result<VideoInfo> {
        self.info
            .clone()
            .ok_or_else(|| anyhow!("no metadata for {video_id}"))
    }
}

/// Explanation service that either fails or serves the local fallback
/// content as if it came from the network.
pub struct FakeExplanations {
    fail: bool,
    topics: Mutex<Vec<String>>,
}

impl FakeExplanations {
    pub fn serving() -> Self {
        Self {
            fail: false,
            topics: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            topics: Mutex::new(Vec::new()),
        }
    }

    pub fn topics(&self) -> Vec<String> {
        lock(&self.topics).clone()
    }
}

#[async_trait]
impl ExplanationService for FakeExplanations {
    async fn explain(&self, topic: &str) -> Result<Explanation> {
        lock(&self.topics).push(topic.to_string());
        if self.fail {
            bail!("explanation service returned 500");
        }
        let mut explanation = fallback_explanation(topic);
        explanation.title = format!("{topic} explained");
        Ok(explanation)
    }
}

/// One set of fakes wired together, keeping handles for assertions.
pub struct FakeWorld {
    pub backend: Arc<FakeEmotionBackend>,
    pub speech: Arc<FakeSpeech>,
    pub completion: Arc<FakeCompletion>,
    pub explanations: Arc<FakeExplanations>,
    pub video_metadata: Arc<FakeVideoMetadata>,
}

impl FakeWorld {
    pub fn new(label: EmotionLabel) -> Self {
        Self {
            backend: Arc::new(FakeEmotionBackend::new(label)),
            speech: Arc::new(FakeSpeech::new(Duration::from_millis(500))),
            completion: Arc::new(FakeCompletion::replying("Here is another angle.")),
            explanations: Arc::new(FakeExplanations::serving()),
            video_metadata: Arc::new(FakeVideoMetadata::returning(VideoInfo::placeholder())),
        }
    }

    pub fn with_speech(mut self, speech: FakeSpeech) -> Self {
        self.speech = Arc::new(speech);
        self
    }

    pub fn with_completion(mut self, completion: FakeCompletion) -> Self {
        self.completion = Arc::new(completion);
        self
    }

    pub fn deps(&self) -> CoordinatorDeps {
        CoordinatorDeps {
            backend: self.backend.clone(),
            speech: self.speech.clone(),
            completion: self.completion.clone(),
            explanations: self.explanations.clone(),
            video_metadata: self.video_metadata.clone(),
        }
    }
}
