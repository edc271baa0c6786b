use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::settings::SpeechBackendSettings;

use super::voice::Voice;

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>, voice: Option<Voice>) -> Self {
        Self {
            text: text.into(),
            voice,
            rate: 0.8,
            pitch: 1.0,
            volume: 0.8,
        }
    }
}

/// A text-to-speech capability.
///
/// `speak` resolves when playback ends. Dropping the future must silence the
/// utterance; `started` is signalled once audio output begins.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn is_supported(&self) -> bool;

    async fn voices(&self) -> Result<Vec<Voice>>;

    async fn speak(&self, utterance: Utterance, started: oneshot::Sender<()>) -> Result<()>;
}

/// Speaks through an espeak-compatible command line program.
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
    available: bool,
}

impl CommandSpeech {
    pub fn new(settings: &SpeechBackendSettings) -> Self {
        Self {
            available: settings.enabled && program_on_path(&settings.program),
            program: settings.program.clone(),
            args: settings.args.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

fn program_on_path(program: &str) -> bool {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Parses `espeak --voices` output:
/// `Pty Language Age/Gender VoiceName File Other Languages`.
fn parse_voice_listing(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [_, language, _, name, ..] => Some(Voice::new(*name, *language)),
                _ => None,
            }
        })
        .collect()
}

#[async_trait]
impl SpeechSynthesizer for CommandSpeech {
    fn is_supported(&self) -> bool {
        self.available
    }

    async fn voices(&self) -> Result<Vec<Voice>> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to run {} --voices", self.program))?;
        if !output.status.success() {
            bail!("{} --voices exited with {}", self.program, output.status);
        }
        Ok(parse_voice_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn speak(&self, utterance: Utterance, started: oneshot::Sender<()>) -> Result<()> {
        let words_per_minute = (175.0 * utterance.rate).round() as u32;
        let pitch = (50.0 * utterance.pitch).clamp(0.0, 99.0).round() as u32;
        let amplitude = (100.0 * utterance.volume).clamp(0.0, 200.0).round() as u32;

        let mut command = self.command();
        command
            .arg("-s")
            .arg(words_per_minute.to_string())
            .arg("-p")
            .arg(pitch.to_string())
            .arg("-a")
            .arg(amplitude.to_string());
        if let Some(voice) = &utterance.voice {
            command.arg("-v").arg(&voice.name);
        }
        command.arg(&utterance.text);

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start {}", self.program))?;
        let _ = started.send(());

        let status = child.wait().await.context("speech process failed")?;
        if !status.success() {
            bail!("{} exited with {}", self.program, status);
        }
        Ok(())
    }
}

/// Used when speech is disabled; narration degrades to text only.
pub struct SilentSpeech;

#[async_trait]
impl SpeechSynthesizer for SilentSpeech {
    fn is_supported(&self) -> bool {
        false
    }

    async fn voices(&self) -> Result<Vec<Voice>> {
        Ok(Vec::new())
    }

    async fn speak(&self, _utterance: Utterance, _started: oneshot::Sender<()>) -> Result<()> {
        bail!("speech synthesis is not available")
    }
}
