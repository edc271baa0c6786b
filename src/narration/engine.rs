use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::pacing::reveal_delay;
use super::speech::{SpeechSynthesizer, Utterance};
use super::voice::{VoiceCache, VoicePreference};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

enum NarrationCommand {
    Narrate { text: String, section_id: String },
    Stop,
    Clear,
    SetMuted(bool),
}

#[derive(Debug)]
enum SpeechEvent {
    Started(u64),
    Finished(u64, Result<()>),
}

/// The single live narration.
#[derive(Debug, Clone)]
pub struct NarrationJob {
    pub text: String,
    pub section_id: String,
    pub revealed_prefix_length: usize,
    pub speaking: bool,
    chars: Vec<char>,
}

impl NarrationJob {
    fn new(text: String, section_id: String) -> Self {
        Self {
            chars: text.chars().collect(),
            text,
            section_id,
            revealed_prefix_length: 0,
            speaking: false,
        }
    }

    fn is_fully_revealed(&self) -> bool {
        self.revealed_prefix_length >= self.chars.len()
    }
}

/// What observers see of the engine after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationSnapshot {
    pub section_id: Option<String>,
    pub text: String,
    pub revealed: usize,
    pub revealing: bool,
    pub speaking: bool,
    pub muted: bool,
}

impl NarrationSnapshot {
    pub fn displayed(&self) -> String {
        self.text.chars().take(self.revealed).collect()
    }

    pub fn is_complete(&self) -> bool {
        !self.revealing && self.revealed == self.text.chars().count()
    }

    pub fn is_idle(&self) -> bool {
        !self.revealing && !self.speaking
    }
}

struct SpeechRun {
    job: u64,
    cancel_token: CancellationToken,
}

/// Handle to the narration worker task.
///
/// Commands are applied in order, and every new narration cancels the live
/// one before it starts.
#[derive(Clone)]
pub struct NarrationEngine {
    tx: mpsc::UnboundedSender<NarrationCommand>,
    snapshot: watch::Receiver<NarrationSnapshot>,
    speech_supported: bool,
}

impl NarrationEngine {
    pub fn spawn(
        synth: Arc<dyn SpeechSynthesizer>,
        preference: VoicePreference,
        muted: bool,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(NarrationSnapshot {
            muted,
            ..NarrationSnapshot::default()
        });
        let speech_supported = synth.is_supported();
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            synth,
            voices: VoiceCache::new(),
            preference,
            job: None,
            job_seq: 0,
            muted,
            next_reveal: None,
            speech: None,
            speech_tx,
            snapshot: snapshot_tx,
        };
        tokio::spawn(worker.run(rx, speech_rx));

        Self {
            tx,
            snapshot,
            speech_supported,
        }
    }

    fn send(&self, command: NarrationCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow!("narration worker has stopped"))
    }

    pub fn narrate(&self, text: impl Into<String>, section_id: impl Into<String>) -> Result<()> {
        self.send(NarrationCommand::Narrate {
            text: text.into(),
            section_id: section_id.into(),
        })
    }

    /// Halts reveal and speech, keeping the text revealed so far.
    pub fn stop(&self) -> Result<()> {
        self.send(NarrationCommand::Stop)
    }

    /// Stops and discards the live job.
    pub fn clear(&self) -> Result<()> {
        self.send(NarrationCommand::Clear)
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.send(NarrationCommand::SetMuted(muted))
    }

    pub fn speech_supported(&self) -> bool {
        self.speech_supported
    }

    pub fn snapshot(&self) -> NarrationSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NarrationSnapshot> {
        self.snapshot.clone()
    }
}

struct Worker {
    synth: Arc<dyn SpeechSynthesizer>,
    voices: VoiceCache,
    preference: VoicePreference,
    job: Option<NarrationJob>,
    job_seq: u64,
    muted: bool,
    next_reveal: Option<Instant>,
    speech: Option<SpeechRun>,
    speech_tx: mpsc::UnboundedSender<SpeechEvent>,
    snapshot: watch::Sender<NarrationSnapshot>,
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<NarrationCommand>,
        mut speech_events: mpsc::UnboundedReceiver<SpeechEvent>,
    ) {
        loop {
            let reveal_at = self.next_reveal;
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(event) = speech_events.recv() => self.on_speech(event),
                _ = tokio::time::sleep_until(reveal_at.unwrap_or_else(Instant::now)), if reveal_at.is_some() => {
                    self.reveal_next();
                }
            }
        }

        self.cancel_speech();
        log_info!("narration worker shutting down");
    }

    fn handle(&mut self, command: NarrationCommand) {
        match command {
            NarrationCommand::Narrate { text, section_id } => {
                self.halt();
                self.job_seq = self.job_seq.wrapping_add(1);
                log_debug!("narrating {} chars for section {section_id}", text.chars().count());
                self.job = Some(NarrationJob::new(text, section_id));
                self.next_reveal = Some(Instant::now());
            }
            NarrationCommand::Stop => self.halt(),
            NarrationCommand::Clear => {
                self.halt();
                self.job = None;
            }
            NarrationCommand::SetMuted(muted) => {
                self.muted = muted;
                if muted {
                    self.cancel_speech();
                }
            }
        }
        self.publish();
    }

    /// Leaves the current job idle: no pending reveal, no speech.
    fn halt(&mut self) {
        self.next_reveal = None;
        self.cancel_speech();
    }

    fn cancel_speech(&mut self) {
        if let Some(run) = self.speech.take() {
            run.cancel_token.cancel();
            log_debug!("speech for job {} cancelled", run.job);
        }
        if let Some(job) = self.job.as_mut() {
            job.speaking = false;
        }
    }

    fn reveal_next(&mut self) {
        let Some(job) = self.job.as_mut() else {
            self.next_reveal = None;
            return;
        };

        if let Some(&ch) = job.chars.get(job.revealed_prefix_length) {
            job.revealed_prefix_length += 1;
            self.next_reveal = Some(Instant::now() + reveal_delay(ch));
        }

        if job.is_fully_revealed() {
            self.next_reveal = None;
            self.on_reveal_complete();
        }
        self.publish();
    }

    fn on_reveal_complete(&mut self) {
        let Some(text) = self.job.as_ref().map(|job| job.text.clone()) else {
            return;
        };
        if self.muted || !self.synth.is_supported() || text.trim().is_empty() {
            return;
        }

        let job_id = self.job_seq;
        let cancel_token = CancellationToken::new();
        self.speech = Some(SpeechRun {
            job: job_id,
            cancel_token: cancel_token.clone(),
        });

        let synth = self.synth.clone();
        let voices = self.voices.clone();
        let preference = self.preference.clone();
        let events = self.speech_tx.clone();

        tokio::spawn(async move {
            let (started_tx, started_rx) = oneshot::channel();
            let started_events = events.clone();
            tokio::spawn(async move {
                if started_rx.await.is_ok() {
                    let _ = started_events.send(SpeechEvent::Started(job_id));
                }
            });

            let speak = async move {
                let voice = voices.resolve(synth.as_ref(), &preference).await;
                synth.speak(Utterance::new(text, voice), started_tx).await
            };

            tokio::select! {
                _ = cancel_token.cancelled() => {}
                result = speak => {
                    let _ = events.send(SpeechEvent::Finished(job_id, result));
                }
            }
        });
    }

    fn on_speech(&mut self, event: SpeechEvent) {
        let current = self.speech.as_ref().map(|run| run.job);
        match event {
            SpeechEvent::Started(job_id) if current == Some(job_id) => {
                if let Some(job) = self.job.as_mut() {
                    job.speaking = true;
                }
            }
            SpeechEvent::Finished(job_id, result) if current == Some(job_id) => {
                if let Err(err) = result {
                    log_warn!("speech playback failed: {err:#}");
                }
                self.speech = None;
                if let Some(job) = self.job.as_mut() {
                    job.speaking = false;
                }
            }
            _ => return,
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = match &self.job {
            Some(job) => NarrationSnapshot {
                section_id: Some(job.section_id.clone()),
                text: job.text.clone(),
                revealed: job.revealed_prefix_length,
                revealing: self.next_reveal.is_some(),
                speaking: job.speaking,
                muted: self.muted,
            },
            None => NarrationSnapshot {
                muted: self.muted,
                ..NarrationSnapshot::default()
            },
        };
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::voice::Voice;
    use crate::testing::FakeSpeech;
    use std::time::Duration;

    fn preference() -> VoicePreference {
        VoicePreference {
            language: "en".into(),
            provider: "Google".into(),
        }
    }

    fn engine(speech: &Arc<FakeSpeech>, muted: bool) -> NarrationEngine {
        NarrationEngine::spawn(speech.clone(), preference(), muted)
    }

    #[tokio::test(start_paused = true)]
    async fn reveals_then_speaks() {
        let speech = Arc::new(FakeSpeech::new(Duration::from_secs(2)));
        let narration = engine(&speech, false);

        narration.narrate("Hi, you.", "intro").unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let partial = narration.snapshot();
        assert!(partial.revealing);
        assert!(partial.revealed < 8);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let snapshot = narration.snapshot();
        assert_eq!(snapshot.displayed(), "Hi, you.");
        assert!(snapshot.speaking);
        assert_eq!(speech.spoken(), vec!["Hi, you.".to_string()]);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(narration.snapshot().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn new_narration_supersedes_the_live_one() {
        let speech = Arc::new(FakeSpeech::new(Duration::from_millis(200)));
        let narration = engine(&speech, false);

        narration.narrate("A.B", "s").unwrap();
        narration.narrate("C", "s").unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshot = narration.snapshot();
        assert_eq!(snapshot.displayed(), "C");
        assert!(snapshot.is_complete());
        assert_eq!(speech.spoken(), vec!["C".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn narrating_while_speaking_cancels_the_speech() {
        let speech = Arc::new(FakeSpeech::new(Duration::from_secs(10)));
        let narration = engine(&speech, false);

        narration.narrate("One", "a").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(narration.snapshot().speaking);

        narration.narrate("Two", "b").unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(speech.cancelled(), 1);
        assert_eq!(narration.snapshot().section_id.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_reveal_leaves_a_consistent_idle_state() {
        let speech = Arc::new(FakeSpeech::new(Duration::from_millis(100)));
        let narration = engine(&speech, false);

        narration.narrate("A fairly long sentence", "s").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        narration.stop().unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let snapshot = narration.snapshot();
        assert!(snapshot.is_idle());
        assert!(!snapshot.is_complete());
        assert!(speech.spoken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_speaking_silences_playback() {
        let speech = Arc::new(FakeSpeech::new(Duration::from_secs(10)));
        let narration = engine(&speech, false);

        narration.narrate("Hello", "s").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        narration.stop().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = narration.snapshot();
        assert!(snapshot.is_idle());
        assert_eq!(snapshot.displayed(), "Hello");
        assert_eq!(speech.cancelled(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn muting_while_speaking_stops_speech_now() {
        let speech = Arc::new(FakeSpeech::new(Duration::from_secs(10)));
        let narration = engine(&speech, false);

        narration.narrate("Hello", "s").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(narration.snapshot().speaking);

        narration.set_muted(true).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snapshot = narration.snapshot();
        assert!(!snapshot.speaking);
        assert!(snapshot.muted);
        assert_eq!(speech.cancelled(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn muted_engine_only_reveals() {
        let speech = Arc::new(FakeSpeech::new(Duration::from_millis(100)));
        let narration = engine(&speech, true);

        narration.narrate("Quiet", "s").unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(narration.snapshot().displayed(), "Quiet");
        assert!(speech.spoken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_speech_degrades_to_text() {
        let speech = Arc::new(FakeSpeech::unsupported());
        let narration = engine(&speech, false);
        assert!(!narration.speech_supported());

        narration.narrate("Text only", "s").unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(narration.snapshot().is_complete());
        assert!(speech.spoken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn voice_is_chosen_at_first_synthesis() {
        let speech = Arc::new(FakeSpeech::new(Duration::from_millis(10)));
        let narration = engine(&speech, false);
        speech.set_voices(vec![
            Voice::new("Alex", "en-US"),
            Voice::new("Google US English", "en-US"),
        ]);

        narration.narrate("Hi", "s").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            speech.voices_used(),
            vec![Some("Google US English".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clear_discards_the_job() {
        let speech = Arc::new(FakeSpeech::new(Duration::from_millis(10)));
        let narration = engine(&speech, false);

        narration.narrate("Bye", "s").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        narration.clear().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = narration.snapshot();
        assert_eq!(snapshot.section_id, None);
        assert_eq!(snapshot.displayed(), "");
    }
}
