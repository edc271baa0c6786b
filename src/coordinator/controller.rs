use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::calming::{BreathingState, QuoteBook, QuoteError};
use crate::intervention::messages::DEFAULT_INTERVENTION_PROMPT;
use crate::intervention::{
    confirm_prompt, opening_message, ActiveSession, InterventionMachine, InterventionStage,
    TriggerDebouncer, TriggerState,
};
use crate::models::{ChatMessage, EmotionLabel, EmotionReading, SensorConfiguration, Transcript};
use crate::narration::{
    CommandSpeech, NarrationEngine, NarrationSnapshot, SilentSpeech, SpeechSynthesizer,
    VoicePreference,
};
use crate::sensing::{
    summarize, EmotionBackend, HttpEmotionBackend, PollTiming, PolledReading, SensingController,
    SensorKind,
};
use crate::settings::{debug_mode, SettingsStore, TimingSettings, UserSettings};
use crate::tutor::chat::detect_mode;
use crate::tutor::explanation::validate_topic;
use crate::tutor::video::validate_video_url;
use crate::tutor::{
    explain_or_fallback, validate_message, ChatAssistant, ChatMode, CompletionService,
    Explanation, ExplanationSection, ExplanationService, HttpExplanationService, OEmbedClient,
    OpenAiCompatibleClient, SummaryStyle, VideoMetadataService, VideoSummarizer,
};
use crate::utils::TimerSlot;

use super::events::{AsyncReply, CoordinatorEvent, CoordinatorUpdate, ShellAction, TimerFired};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const UPDATE_CAPACITY: usize = 256;
pub const SPEECH_UNSUPPORTED_NOTICE: &str =
    "Speech synthesis is not supported here; narration will be text only.";

/// The external collaborators the coordinator talks to.
#[derive(Clone)]
pub struct CoordinatorDeps {
    pub backend: Arc<dyn EmotionBackend>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub completion: Arc<dyn CompletionService>,
    pub explanations: Arc<dyn ExplanationService>,
    pub video_metadata: Arc<dyn VideoMetadataService>,
}

impl CoordinatorDeps {
    /// Network-backed collaborators built from settings.
    pub fn from_settings(settings: &UserSettings) -> Self {
        let backend_timeout = settings.backend.request_timeout();
        let speech: Arc<dyn SpeechSynthesizer> = if settings.narration.speech.enabled {
            Arc::new(CommandSpeech::new(&settings.narration.speech))
        } else {
            Arc::new(SilentSpeech)
        };

        Self {
            backend: Arc::new(HttpEmotionBackend::new(
                &settings.backend.base_url,
                backend_timeout,
            )),
            speech,
            completion: Arc::new(OpenAiCompatibleClient::new(
                &settings.llm.api_url,
                &settings.llm.model,
                settings.llm.api_key(),
                settings.llm.request_timeout(),
            )),
            explanations: Arc::new(HttpExplanationService::new(
                &settings.backend.base_url,
                settings.llm.request_timeout(),
            )),
            video_metadata: Arc::new(OEmbedClient::new(
                &settings.llm.oembed_url,
                backend_timeout,
            )),
        }
    }
}

/// Everything a renderer needs, republished after every event.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorSnapshot {
    pub stage: InterventionStage,
    pub sensors: SensorConfiguration,
    pub trigger: TriggerState,
    pub last_reading: Option<EmotionReading>,
    pub pending_label: Option<EmotionLabel>,
    pub confirming_label: Option<EmotionLabel>,
    pub session: Option<ActiveSession>,
    pub transcript: Vec<ChatMessage>,
    pub explanation: Option<Explanation>,
    pub breathing: BreathingState,
    pub pending_requests: usize,
    pub speech_notice_shown: bool,
}

impl CoordinatorSnapshot {
    pub fn stage(&self) -> InterventionStage {
        self.stage
    }
}

#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
    updates: broadcast::Sender<CoordinatorUpdate>,
    snapshot: watch::Receiver<CoordinatorSnapshot>,
    narration: NarrationEngine,
}

impl CoordinatorHandle {
    /// Starts the coordinator loop on the current runtime.
    pub fn spawn(settings: Arc<SettingsStore>, deps: CoordinatorDeps) -> (Self, JoinHandle<Result<()>>) {
        let (tx, events) = mpsc::unbounded_channel();
        let (readings_tx, readings) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(settings, deps, tx.clone(), readings_tx);

        let handle = Self {
            tx,
            updates: coordinator.updates.clone(),
            snapshot: coordinator.snapshot.subscribe(),
            narration: coordinator.narration.clone(),
        };
        let join = tokio::spawn(coordinator.run(events, readings));
        (handle, join)
    }

    pub fn send(&self, action: ShellAction) -> Result<()> {
        self.tx
            .send(CoordinatorEvent::Action(action))
            .map_err(|_| anyhow!("coordinator has stopped"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorUpdate> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.snapshot.clone()
    }

    pub fn narration(&self) -> watch::Receiver<NarrationSnapshot> {
        self.narration.subscribe()
    }
}

/// Owns every piece of mutable session state. All changes happen on the
/// coordinator task, one event at a time.
struct Coordinator {
    settings: Arc<SettingsStore>,
    timing: TimingSettings,
    sensing: SensingController,
    debouncer: TriggerDebouncer,
    machine: InterventionMachine,
    narration: NarrationEngine,
    muted: bool,
    transcript: Transcript,
    explanation: Option<Explanation>,
    breathing: BreathingState,
    quotes: QuoteBook,
    chat: ChatAssistant,
    videos: VideoSummarizer,
    explanations: Arc<dyn ExplanationService>,
    backend: Arc<dyn EmotionBackend>,
    grace_timer: TimerSlot,
    confirm_timer: TimerSlot,
    cooldown_timer: TimerSlot,
    breathing_timer: TimerSlot,
    events_tx: mpsc::UnboundedSender<CoordinatorEvent>,
    updates: broadcast::Sender<CoordinatorUpdate>,
    snapshot: watch::Sender<CoordinatorSnapshot>,
    last_reading: Option<EmotionReading>,
    pending_requests: usize,
    speech_notice_shown: bool,
}

impl Coordinator {
    fn new(
        settings: Arc<SettingsStore>,
        deps: CoordinatorDeps,
        events_tx: mpsc::UnboundedSender<CoordinatorEvent>,
        readings_tx: mpsc::UnboundedSender<PolledReading>,
    ) -> Self {
        let data = settings.snapshot();
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let (snapshot, _) = watch::channel(CoordinatorSnapshot::default());

        let narration = NarrationEngine::spawn(
            deps.speech.clone(),
            VoicePreference {
                language: data.narration.language.clone(),
                provider: data.narration.preferred_provider.clone(),
            },
            data.narration.muted,
        );
        let timing = PollTiming {
            interval: data.timing.poll_interval(),
            timeout: data.timing.poll_timeout(),
            verbose: debug_mode(),
        };
        let videos = VideoSummarizer::new(deps.completion.clone(), deps.video_metadata.clone());

        let coordinator = Self {
            settings,
            sensing: SensingController::new(deps.backend.clone(), readings_tx, timing),
            debouncer: TriggerDebouncer::new(data.timing.cooldown()),
            timing: data.timing,
            machine: InterventionMachine::new(),
            narration,
            muted: data.narration.muted,
            transcript: Transcript::new(),
            explanation: None,
            breathing: BreathingState::new(),
            quotes: QuoteBook::new(),
            chat: ChatAssistant::new(deps.completion.clone(), videos.clone()),
            videos,
            explanations: deps.explanations,
            backend: deps.backend,
            grace_timer: TimerSlot::new(),
            confirm_timer: TimerSlot::new(),
            cooldown_timer: TimerSlot::new(),
            breathing_timer: TimerSlot::new(),
            events_tx,
            updates,
            snapshot,
            last_reading: None,
            pending_requests: 0,
            speech_notice_shown: false,
        };
        coordinator.publish_snapshot();
        coordinator
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<CoordinatorEvent>,
        mut readings: mpsc::UnboundedReceiver<PolledReading>,
    ) -> Result<()> {
        log_info!("coordinator started");

        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    None | Some(CoordinatorEvent::Action(ShellAction::Shutdown)) => break,
                    Some(event) => {
                        if let Err(err) = self.handle(event).await {
                            log_error!("coordinator event failed: {err:#}");
                        }
                    }
                },
                Some(polled) = readings.recv() => self.on_reading(polled),
            }
            self.publish_snapshot();
        }

        self.shutdown().await
    }

    async fn shutdown(mut self) -> Result<()> {
        for timer in [
            &mut self.grace_timer,
            &mut self.confirm_timer,
            &mut self.cooldown_timer,
            &mut self.breathing_timer,
        ] {
            timer.cancel();
        }
        let _ = self.narration.clear();
        self.sensing.stop_sensing().await?;
        log_info!("coordinator stopped");
        Ok(())
    }

    async fn handle(&mut self, event: CoordinatorEvent) -> Result<()> {
        match event {
            CoordinatorEvent::Action(action) => self.on_action(action).await?,
            CoordinatorEvent::Timer(fired) => self.on_timer(fired),
            CoordinatorEvent::Reply(reply) => self.on_reply(reply),
        }
        Ok(())
    }

    fn emit(&self, update: CoordinatorUpdate) {
        // no subscribers is fine
        let _ = self.updates.send(update);
    }

    fn notice(&self, text: impl Into<String>) {
        self.emit(CoordinatorUpdate::Notice(text.into()));
    }

    fn publish_snapshot(&self) {
        let snapshot = CoordinatorSnapshot {
            stage: self.machine.stage(),
            sensors: self.sensing.config(),
            trigger: self.debouncer.state().clone(),
            last_reading: self.last_reading.clone(),
            pending_label: self.machine.pending_label(),
            confirming_label: self.machine.confirming_label(),
            session: self.machine.session().cloned(),
            transcript: self.transcript.messages().to_vec(),
            explanation: self.explanation.clone(),
            breathing: self.breathing.clone(),
            pending_requests: self.pending_requests,
            speech_notice_shown: self.speech_notice_shown,
        };
        self.snapshot.send_replace(snapshot);
    }

    fn on_reading(&mut self, polled: PolledReading) {
        if !self.sensing.is_current(polled.generation) {
            log_debug!(
                "discarding stale reading from generation {} ({:?})",
                polled.generation,
                polled.config
            );
            return;
        }

        let reading = polled.reading;
        self.last_reading = Some(reading.clone());
        self.emit(CoordinatorUpdate::Reading(reading.clone()));

        let Some(trigger) = self.debouncer.observe(reading.label, Instant::now()) else {
            return;
        };
        log_info!("intervention trigger: {}", trigger.label);

        let cooldown = trigger
            .cooldown_until
            .saturating_duration_since(Instant::now());
        self.cooldown_timer.arm(cooldown, &self.events_tx, |generation| {
            CoordinatorEvent::Timer(TimerFired::Cooldown(generation))
        });

        if self.machine.begin_grace(trigger.label) {
            self.grace_timer
                .arm(self.timing.grace(), &self.events_tx, |generation| {
                    CoordinatorEvent::Timer(TimerFired::Grace(generation))
                });
        } else {
            log_debug!(
                "trigger {} ignored while {:?}",
                trigger.label,
                self.machine.stage()
            );
        }
    }

    fn on_timer(&mut self, fired: TimerFired) {
        match fired {
            TimerFired::Grace(generation) => {
                if !self.grace_timer.fire(generation) {
                    return;
                }
                if let Some(label) = self.machine.grace_elapsed() {
                    self.emit(CoordinatorUpdate::StageChanged(InterventionStage::Confirming));
                    self.emit(CoordinatorUpdate::ConfirmPrompt {
                        label,
                        text: confirm_prompt(label).to_string(),
                    });
                    self.confirm_timer
                        .arm(self.timing.confirm_timeout(), &self.events_tx, |generation| {
                            CoordinatorEvent::Timer(TimerFired::ConfirmTimeout(generation))
                        });
                }
            }
            TimerFired::ConfirmTimeout(generation) => {
                if self.confirm_timer.fire(generation) && self.machine.confirm_timed_out() {
                    log_info!("confirmation timed out");
                    self.emit(CoordinatorUpdate::StageChanged(InterventionStage::Idle));
                }
            }
            TimerFired::Cooldown(generation) => {
                if self.cooldown_timer.fire(generation) {
                    log_debug!("trigger cooldown elapsed");
                    self.debouncer.end_cooldown();
                }
            }
            TimerFired::Breathing(generation) => {
                if self.breathing_timer.fire(generation) {
                    self.breathing.finish();
                    self.emit(CoordinatorUpdate::BreathingFinished);
                }
            }
        }
    }

    /// Re-arms emotion triggering right away after a user dismissal or a
    /// manual open.
    fn end_cooldown(&mut self) {
        self.debouncer.end_cooldown();
        self.cooldown_timer.cancel();
    }

    async fn on_action(&mut self, action: ShellAction) -> Result<()> {
        match action {
            ShellAction::ToggleSensor(sensor) => {
                let mut config = self.sensing.config();
                let enabled = match sensor {
                    SensorKind::Camera => {
                        config.camera_on = !config.camera_on;
                        config.camera_on
                    }
                    SensorKind::Microphone => {
                        config.mic_on = !config.mic_on;
                        config.mic_on
                    }
                };
                self.sensing.notify_toggle(sensor, enabled);
                self.apply_sensors(config).await?;
            }
            ShellAction::SetSensors(config) => {
                let current = self.sensing.config();
                if current.camera_on != config.camera_on {
                    self.sensing.notify_toggle(SensorKind::Camera, config.camera_on);
                }
                if current.mic_on != config.mic_on {
                    self.sensing.notify_toggle(SensorKind::Microphone, config.mic_on);
                }
                self.apply_sensors(config).await?;
            }
            ShellAction::OpenAssistant => self.open_manual(),
            ShellAction::AcceptPrompt => {
                if let Some(session) = self.machine.accept().cloned() {
                    self.confirm_timer.cancel();
                    self.start_session(&session);
                }
            }
            ShellAction::DeclinePrompt => {
                if self.machine.decline() {
                    self.confirm_timer.cancel();
                    self.end_cooldown();
                    self.emit(CoordinatorUpdate::StageChanged(InterventionStage::Idle));
                }
            }
            ShellAction::CloseAssistant => self.close_session(),
            ShellAction::SendMessage(text) => self.send_message(&text),
            ShellAction::Intervene { mode, input } => self.intervene(mode, input),
            ShellAction::SummarizeVideo { url, style } => self.summarize_video(&url, style),
            ShellAction::Explain(topic) => self.explain(&topic),
            ShellAction::NarrateSection(section) => self.narrate_section(section),
            ShellAction::StopNarration => self.narration.stop()?,
            ShellAction::SetMuted(muted) => self.set_muted(muted)?,
            ShellAction::ToggleMute => self.set_muted(!self.muted)?,
            ShellAction::StartBreathing => self.start_breathing(),
            ShellAction::StopBreathing => {
                if self.breathing.is_running() {
                    self.breathing.cancel();
                    self.breathing_timer.cancel();
                    self.emit(CoordinatorUpdate::BreathingStopped);
                }
            }
            ShellAction::AddQuote(text) => {
                let outcome = self.quotes.add(&text);
                self.after_quote_change(outcome);
            }
            ShellAction::EditQuote { index, text } => {
                let outcome = self.quotes.edit(index, &text);
                self.after_quote_change(outcome);
            }
            ShellAction::RemoveQuote(index) => {
                let outcome = self.quotes.remove(index).map(|_| ());
                self.after_quote_change(outcome);
            }
            ShellAction::ListQuotes => {
                self.emit(CoordinatorUpdate::Quotes(self.quotes.quotes().to_vec()));
            }
            ShellAction::ShowMood => self.show_mood(),
            ShellAction::Shutdown => {}
        }
        Ok(())
    }

    async fn apply_sensors(&mut self, config: SensorConfiguration) -> Result<()> {
        if !self.sensing.apply(config).await? {
            return Ok(());
        }
        if config.is_suspended() {
            self.debouncer.reset();
            self.cooldown_timer.cancel();
            if self.machine.cancel_pending() {
                self.grace_timer.cancel();
            }
        }
        self.emit(CoordinatorUpdate::SensorsChanged(config));
        Ok(())
    }

    fn open_manual(&mut self) {
        self.end_cooldown();
        let Some(session) = self.machine.open_manual().cloned() else {
            log_debug!("assistant already open");
            return;
        };
        self.grace_timer.cancel();
        self.confirm_timer.cancel();
        self.start_session(&session);
    }

    fn start_session(&mut self, session: &ActiveSession) {
        log_info!("assistant session {} opened ({:?})", session.id, session.origin);
        self.transcript.clear();
        self.explanation = None;
        self.emit(CoordinatorUpdate::StageChanged(InterventionStage::Active));

        let greeting = opening_message(session.origin.label());
        self.push_assistant(greeting.to_string());
    }

    fn close_session(&mut self) {
        let Some(session) = self.machine.close() else {
            return;
        };
        log_info!("assistant session {} closed", session.id);
        self.grace_timer.cancel();
        self.confirm_timer.cancel();
        self.end_cooldown();
        if let Err(err) = self.narration.clear() {
            log_warn!("failed to clear narration: {err:#}");
        }
        self.transcript.clear();
        self.explanation = None;
        self.emit(CoordinatorUpdate::StageChanged(InterventionStage::Idle));
    }

    fn active_session(&self) -> Option<Uuid> {
        let id = self.machine.session().map(|session| session.id);
        if id.is_none() {
            self.notice("Open the assistant first.");
        }
        id
    }

    fn push_assistant(&mut self, text: String) {
        let message = self.transcript.push(ChatMessage::assistant(text)).clone();
        self.emit(CoordinatorUpdate::Message(message.clone()));
        let section = format!("message-{}", self.transcript.len());
        self.narrate(message.text, section);
    }

    fn narrate(&mut self, text: String, section_id: String) {
        if !self.narration.speech_supported() && !self.speech_notice_shown {
            self.speech_notice_shown = true;
            self.notice(SPEECH_UNSUPPORTED_NOTICE);
        }
        if let Err(err) = self.narration.narrate(text, section_id) {
            log_error!("narration unavailable: {err:#}");
        }
    }

    fn spawn_request<F>(&mut self, request: F)
    where
        F: Future<Output = AsyncReply> + Send + 'static,
    {
        self.pending_requests += 1;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let reply = request.await;
            let _ = tx.send(CoordinatorEvent::Reply(reply));
        });
    }

    fn send_message(&mut self, raw: &str) {
        let Some(session) = self.active_session() else {
            return;
        };
        let text = match validate_message(raw) {
            Ok(text) => text.to_string(),
            Err(err) => {
                self.notice(err.to_string());
                return;
            }
        };

        let message = self.transcript.push(ChatMessage::user(text.clone())).clone();
        self.emit(CoordinatorUpdate::Message(message));

        let mode = detect_mode(&text);
        let chat = self.chat.clone();
        self.spawn_request(async move {
            AsyncReply::Chat {
                session,
                text: chat.reply(mode, &text).await,
            }
        });
    }

    fn intervene(&mut self, mode: ChatMode, input: Option<String>) {
        let Some(session) = self.active_session() else {
            return;
        };
        let prompt = input
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| DEFAULT_INTERVENTION_PROMPT.to_string());

        log_info!("intervention {} requested", mode.tag());
        let chat = self.chat.clone();
        self.spawn_request(async move {
            AsyncReply::Chat {
                session,
                text: chat.reply(mode, &prompt).await,
            }
        });
    }

    fn summarize_video(&mut self, raw_url: &str, style: SummaryStyle) {
        let Some(session) = self.active_session() else {
            return;
        };
        let url = match validate_video_url(raw_url) {
            Ok(url) => url.to_string(),
            Err(err) => {
                self.notice(err.to_string());
                return;
            }
        };

        let videos = self.videos.clone();
        self.spawn_request(async move {
            AsyncReply::Chat {
                session,
                text: videos.summarize(&url, style).await,
            }
        });
    }

    fn explain(&mut self, raw_topic: &str) {
        let Some(session) = self.active_session() else {
            return;
        };
        let topic = match validate_topic(raw_topic) {
            Ok(topic) => topic.to_string(),
            Err(err) => {
                self.notice(err.to_string());
                return;
            }
        };

        if let Err(err) = self.narration.stop() {
            log_warn!("failed to stop narration: {err:#}");
        }
        self.explanation = None;
        let service = self.explanations.clone();
        self.spawn_request(async move {
            let explanation = explain_or_fallback(service.as_ref(), &topic).await;
            AsyncReply::Explanation {
                session,
                topic,
                explanation,
            }
        });
    }

    fn narrate_section(&mut self, section: ExplanationSection) {
        let Some(text) = self
            .explanation
            .as_ref()
            .map(|explanation| explanation.section_text(section))
        else {
            self.notice("Ask the tutor about a topic first.");
            return;
        };
        self.narrate(text, section.id().to_string());
    }

    fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.muted = muted;
        self.narration.set_muted(muted)?;
        if let Err(err) = self.settings.set_muted(muted) {
            log_warn!("could not persist mute preference: {err:#}");
        }
        Ok(())
    }

    fn after_quote_change(&mut self, outcome: Result<(), QuoteError>) {
        match outcome {
            Ok(()) => self.emit(CoordinatorUpdate::Quotes(self.quotes.quotes().to_vec())),
            Err(err) => self.notice(err.to_string()),
        }
    }

    fn start_breathing(&mut self) {
        let quote = self.quotes.pick(&mut rand::thread_rng()).to_string();
        let duration = self.timing.breathing();
        let now = Instant::now();
        self.breathing
            .begin(quote.clone(), duration.as_millis() as u64, now);
        self.breathing_timer
            .arm(duration, &self.events_tx, |generation| {
                CoordinatorEvent::Timer(TimerFired::Breathing(generation))
            });
        self.emit(CoordinatorUpdate::BreathingStarted {
            quote,
            seconds: self.breathing.remaining_secs(now),
        });
    }

    fn show_mood(&mut self) {
        let backend = self.backend.clone();
        self.spawn_request(async move {
            let summary = backend
                .emotion_history()
                .await
                .map(|records| summarize(&records))
                .map_err(|err| format!("{err:#}"));
            AsyncReply::Mood(summary)
        });
    }

    fn on_reply(&mut self, reply: AsyncReply) {
        self.pending_requests = self.pending_requests.saturating_sub(1);
        match reply {
            AsyncReply::Chat { session, text } => {
                if !self.machine.is_current_session(session) {
                    log_debug!("dropping reply for closed session {session}");
                    return;
                }
                self.push_assistant(text);
            }
            AsyncReply::Explanation {
                session,
                topic,
                explanation,
            } => {
                if !self.machine.is_current_session(session) {
                    log_debug!("dropping explanation of {topic:?} for closed session {session}");
                    return;
                }
                let overview = explanation.overview.clone();
                self.explanation = Some(explanation.clone());
                self.emit(CoordinatorUpdate::Explanation(explanation));
                self.narrate(overview, ExplanationSection::Overview.id().to_string());
            }
            AsyncReply::Mood(Ok(summary)) => self.emit(CoordinatorUpdate::Mood(summary)),
            AsyncReply::Mood(Err(err)) => {
                log_warn!("mood history unavailable: {err}");
                self.notice("Mood history is unavailable right now.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatRole, EndpointKind};
    use crate::testing::{FakeCompletion, FakeSpeech, FakeWorld};
    use std::time::Duration;

    fn start(world: &FakeWorld) -> CoordinatorHandle {
        let settings = Arc::new(SettingsStore::ephemeral(UserSettings::default()));
        let (handle, _join) = CoordinatorHandle::spawn(settings, world.deps());
        handle
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn camera_on(handle: &CoordinatorHandle) {
        handle
            .send(ShellAction::SetSensors(SensorConfiguration::new(true, false)))
            .unwrap();
        settle(50).await;
    }

    #[tokio::test(start_paused = true)]
    async fn sensors_off_never_polls() {
        let world = FakeWorld::new(EmotionLabel::Confused);
        let handle = start(&world);

        settle(30_000).await;

        assert!(world.backend.calls().is_empty());
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage(), InterventionStage::Idle);
        assert!(snapshot.last_reading.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_prompt_times_out_to_idle() {
        let world = FakeWorld::new(EmotionLabel::Confused);
        let handle = start(&world);
        let mut updates = handle.subscribe();

        camera_on(&handle).await;
        assert_eq!(world.backend.calls().first(), Some(&EndpointKind::Facial));
        assert_eq!(handle.snapshot().pending_label, Some(EmotionLabel::Confused));
        assert_eq!(handle.snapshot().stage(), InterventionStage::Idle);

        settle(1_000).await;
        assert_eq!(handle.snapshot().stage(), InterventionStage::Confirming);

        settle(10_000).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage(), InterventionStage::Idle);
        assert!(snapshot.trigger.triggered);

        let mut prompts = Vec::new();
        while let Ok(update) = updates.try_recv() {
            if let CoordinatorUpdate::ConfirmPrompt { text, .. } = update {
                prompts.push(text);
            }
        }
        assert_eq!(prompts, vec!["You seem confused. Want to open AI Assistant?"]);
    }

    #[tokio::test(start_paused = true)]
    async fn same_emotion_does_not_retrigger_after_cooldown() {
        let world = FakeWorld::new(EmotionLabel::Confused);
        let handle = start(&world);
        camera_on(&handle).await;

        settle(20_000).await;
        let snapshot = handle.snapshot();
        assert!(!snapshot.trigger.triggered);
        assert_eq!(snapshot.stage(), InterventionStage::Idle);
        assert_eq!(snapshot.pending_label, None);
    }

    #[tokio::test(start_paused = true)]
    async fn accepting_opens_with_emotion_message() {
        let world = FakeWorld::new(EmotionLabel::Frustrated);
        let handle = start(&world);
        camera_on(&handle).await;
        settle(1_000).await;

        handle.send(ShellAction::AcceptPrompt).unwrap();
        settle(10).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage(), InterventionStage::Active);
        assert_eq!(snapshot.transcript.len(), 1);
        assert_eq!(
            snapshot.transcript[0].text,
            opening_message(Some(EmotionLabel::Frustrated))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn decline_rearms_for_a_new_emotion() {
        let world = FakeWorld::new(EmotionLabel::Confused);
        let handle = start(&world);
        camera_on(&handle).await;
        settle(1_000).await;

        handle.send(ShellAction::DeclinePrompt).unwrap();
        settle(10).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage(), InterventionStage::Idle);
        assert!(!snapshot.trigger.triggered);

        world.backend.set_label(EmotionLabel::Bored);
        settle(1_500).await;
        assert_eq!(handle.snapshot().pending_label, Some(EmotionLabel::Bored));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_open_cancels_pending_grace() {
        let world = FakeWorld::new(EmotionLabel::Sleepy);
        let handle = start(&world);
        camera_on(&handle).await;

        handle.send(ShellAction::OpenAssistant).unwrap();
        settle(5_000).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage(), InterventionStage::Active);
        assert_eq!(snapshot.transcript[0].text, crate::intervention::DEFAULT_GREETING);
        assert!(!snapshot.trigger.triggered);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_after_close_is_dropped() {
        let world = FakeWorld::new(EmotionLabel::Happy)
            .with_completion(FakeCompletion::replying("late").with_delay(Duration::from_secs(5)));
        let handle = start(&world);

        handle.send(ShellAction::OpenAssistant).unwrap();
        handle
            .send(ShellAction::SendMessage("what is recursion?".into()))
            .unwrap();
        settle(10).await;
        assert_eq!(handle.snapshot().pending_requests, 1);

        handle.send(ShellAction::CloseAssistant).unwrap();
        handle.send(ShellAction::OpenAssistant).unwrap();
        settle(6_000).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.pending_requests, 0);
        assert_eq!(snapshot.transcript.len(), 1);
        assert!(snapshot.transcript.iter().all(|message| message.text != "late"));
    }

    #[tokio::test(start_paused = true)]
    async fn chat_reply_is_appended_and_narrated() {
        let world = FakeWorld::new(EmotionLabel::Happy);
        let handle = start(&world);

        handle.send(ShellAction::OpenAssistant).unwrap();
        handle.send(ShellAction::SendMessage("  hello ".into())).unwrap();
        settle(20_000).await;

        let roles: Vec<ChatRole> = handle
            .snapshot()
            .transcript
            .iter()
            .map(|message| message.role)
            .collect();
        assert_eq!(roles, vec![ChatRole::Assistant, ChatRole::User, ChatRole::Assistant]);
        assert_eq!(world.completion.prompts(), vec![ChatMode::Default.prompt("hello")]);
        assert!(world
            .speech
            .spoken()
            .contains(&"Here is another angle.".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn chat_without_session_is_refused() {
        let world = FakeWorld::new(EmotionLabel::Happy);
        let handle = start(&world);
        let mut updates = handle.subscribe();

        handle.send(ShellAction::SendMessage("hello".into())).unwrap();
        settle(10).await;

        assert!(world.completion.prompts().is_empty());
        assert!(matches!(updates.try_recv(), Ok(CoordinatorUpdate::Notice(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn explanation_falls_back_and_narrates_sections() {
        let world = FakeWorld::new(EmotionLabel::Happy);
        let handle = start(&world);
        handle.send(ShellAction::OpenAssistant).unwrap();
        handle.send(ShellAction::Explain("react".into())).unwrap();
        settle(100).await;

        let explanation = handle.snapshot().explanation.unwrap();
        assert_eq!(explanation.title, "react explained");
        assert_eq!(world.explanations.topics(), vec!["react".to_string()]);

        handle
            .send(ShellAction::NarrateSection(ExplanationSection::KeyConcepts))
            .unwrap();
        settle(50).await;
        let narration = handle.narration().borrow().clone();
        assert_eq!(narration.section_id.as_deref(), Some("keyConcepts"));
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_speech_shows_one_notice() {
        let world = FakeWorld::new(EmotionLabel::Happy).with_speech(FakeSpeech::unsupported());
        let handle = start(&world);
        let mut updates = handle.subscribe();

        handle.send(ShellAction::OpenAssistant).unwrap();
        handle.send(ShellAction::CloseAssistant).unwrap();
        handle.send(ShellAction::OpenAssistant).unwrap();
        settle(50).await;

        let mut notices = 0;
        while let Ok(update) = updates.try_recv() {
            if update == CoordinatorUpdate::Notice(SPEECH_UNSUPPORTED_NOTICE.to_string()) {
                notices += 1;
            }
        }
        assert_eq!(notices, 1);
        assert!(handle.snapshot().speech_notice_shown);
    }

    #[tokio::test(start_paused = true)]
    async fn turning_sensors_off_clears_trigger_state() {
        let world = FakeWorld::new(EmotionLabel::Confused);
        let handle = start(&world);
        camera_on(&handle).await;
        assert!(handle.snapshot().trigger.triggered);

        handle.send(ShellAction::ToggleSensor(SensorKind::Camera)).unwrap();
        settle(50).await;

        let snapshot = handle.snapshot();
        assert!(snapshot.sensors.is_suspended());
        assert_eq!(snapshot.trigger, TriggerState::default());
        assert_eq!(snapshot.pending_label, None);
        let calls = world.backend.calls().len();
        settle(10_000).await;
        assert_eq!(world.backend.calls().len(), calls);
        assert!(world
            .backend
            .notifications()
            .contains(&(SensorKind::Camera, false)));
    }

    #[tokio::test(start_paused = true)]
    async fn breathing_exercise_runs_to_completion() {
        let world = FakeWorld::new(EmotionLabel::Happy);
        let handle = start(&world);
        let mut updates = handle.subscribe();

        handle.send(ShellAction::StartBreathing).unwrap();
        settle(10).await;
        assert!(handle.snapshot().breathing.is_running());

        settle(120_000).await;
        assert!(!handle.snapshot().breathing.is_running());
        let mut finished = false;
        while let Ok(update) = updates.try_recv() {
            finished |= update == CoordinatorUpdate::BreathingFinished;
        }
        assert!(finished);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_mute_toggles_cancel_out() {
        let world = FakeWorld::new(EmotionLabel::Happy);
        let settings = Arc::new(SettingsStore::ephemeral(UserSettings::default()));
        let (handle, _join) = CoordinatorHandle::spawn(settings.clone(), world.deps());

        handle.send(ShellAction::ToggleMute).unwrap();
        handle.send(ShellAction::ToggleMute).unwrap();
        settle(50).await;
        assert!(!settings.narration().muted);
        assert!(!handle.narration().borrow().muted);

        handle.send(ShellAction::ToggleMute).unwrap();
        settle(50).await;
        assert!(settings.narration().muted);
        assert!(handle.narration().borrow().muted);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_poll_reports_unknown_after_timeout() {
        let world = FakeWorld::new(EmotionLabel::Confused);
        world.backend.set_delay(Duration::from_secs(30));
        let handle = start(&world);
        camera_on(&handle).await;
        assert!(handle.snapshot().last_reading.is_none());

        settle(8_100).await;
        let reading = handle.snapshot().last_reading.unwrap();
        assert_eq!(reading.label, EmotionLabel::Unknown);
        assert_eq!(reading.source, EndpointKind::Unavailable);
        assert!(!handle.snapshot().trigger.triggered);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_poll_is_dropped_when_sensors_go_off() {
        let world = FakeWorld::new(EmotionLabel::Confused);
        world.backend.set_delay(Duration::from_millis(500));
        let handle = start(&world);

        handle
            .send(ShellAction::SetSensors(SensorConfiguration::new(true, false)))
            .unwrap();
        settle(10).await;
        handle
            .send(ShellAction::SetSensors(SensorConfiguration::new(false, false)))
            .unwrap();
        settle(2_000).await;

        let snapshot = handle.snapshot();
        assert!(snapshot.last_reading.is_none());
        assert!(!snapshot.trigger.triggered);
        assert_eq!(snapshot.pending_label, None);
    }

    #[tokio::test(start_paused = true)]
    async fn readings_from_a_replaced_configuration_are_discarded() {
        let world = FakeWorld::new(EmotionLabel::Happy);
        let settings = Arc::new(SettingsStore::ephemeral(UserSettings::default()));
        let (events_tx, _events) = mpsc::unbounded_channel();
        let (readings_tx, _readings) = mpsc::unbounded_channel();
        let mut coordinator = Coordinator::new(settings, world.deps(), events_tx, readings_tx);

        let camera = SensorConfiguration::new(true, false);
        coordinator.apply_sensors(camera).await.unwrap();
        let stale = coordinator.sensing.generation();
        coordinator
            .apply_sensors(SensorConfiguration::new(false, true))
            .await
            .unwrap();

        coordinator.on_reading(PolledReading {
            generation: stale,
            config: camera,
            reading: EmotionReading::new(EmotionLabel::Confused, EndpointKind::Facial),
        });
        assert!(coordinator.last_reading.is_none());
        assert!(!coordinator.debouncer.state().triggered);

        coordinator.on_reading(PolledReading {
            generation: coordinator.sensing.generation(),
            config: SensorConfiguration::new(false, true),
            reading: EmotionReading::new(EmotionLabel::Confused, EndpointKind::Voice),
        });
        assert_eq!(
            coordinator.last_reading.as_ref().map(|reading| reading.label),
            Some(EmotionLabel::Confused)
        );
        assert!(coordinator.debouncer.state().triggered);
        coordinator.sensing.stop_sensing().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_while_active_ends_the_cooldown() {
        let world = FakeWorld::new(EmotionLabel::Confused);
        let handle = start(&world);
        handle.send(ShellAction::OpenAssistant).unwrap();
        settle(10).await;

        camera_on(&handle).await;
        let snapshot = handle.snapshot();
        assert!(snapshot.trigger.triggered);
        assert_eq!(snapshot.stage(), InterventionStage::Active);

        handle.send(ShellAction::OpenAssistant).unwrap();
        settle(10).await;
        let snapshot = handle.snapshot();
        assert!(!snapshot.trigger.triggered);
        assert_eq!(snapshot.stage(), InterventionStage::Active);
        assert_eq!(snapshot.transcript.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quotes_can_be_added_edited_and_removed() {
        let world = FakeWorld::new(EmotionLabel::Happy);
        let handle = start(&world);
        let mut updates = handle.subscribe();

        handle.send(ShellAction::AddQuote("  Rest is part of the work. ".into())).unwrap();
        handle
            .send(ShellAction::EditQuote {
                index: 0,
                text: "Inhale. Exhale.".into(),
            })
            .unwrap();
        handle.send(ShellAction::RemoveQuote(1)).unwrap();
        handle.send(ShellAction::AddQuote("   ".into())).unwrap();
        handle.send(ShellAction::RemoveQuote(99)).unwrap();
        settle(10).await;

        let mut lists = Vec::new();
        let mut notices = Vec::new();
        while let Ok(update) = updates.try_recv() {
            match update {
                CoordinatorUpdate::Quotes(quotes) => lists.push(quotes),
                CoordinatorUpdate::Notice(text) => notices.push(text),
                _ => {}
            }
        }
        assert_eq!(lists.len(), 3);
        let last = lists.last().unwrap();
        assert_eq!(last.len(), crate::calming::CALMING_QUOTES.len());
        assert_eq!(last[0], "Inhale. Exhale.");
        assert_eq!(last.last().map(String::as_str), Some("Rest is part of the work."));
        assert_eq!(notices, vec!["A quote cannot be empty.", "There is no quote #100."]);
    }
}
