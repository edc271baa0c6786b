use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

pub const SETTINGS_PATH_ENV: &str = "EMOLEARN_SETTINGS";
const DEFAULT_SETTINGS_FILE: &str = "emolearn.settings.json";

/// `EMOLEARN_DEBUG=1` (or `true`) turns on per-tick logging.
pub fn debug_mode() -> bool {
    std::env::var("EMOLEARN_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            request_timeout_ms: 5_000,
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Timer lengths for polling and the intervention lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingSettings {
    pub poll_interval_ms: u64,
    /// Upper bound for one tick including the fallback request.
    pub poll_timeout_ms: u64,
    pub cooldown_ms: u64,
    pub grace_ms: u64,
    pub confirm_timeout_ms: u64,
    pub breathing_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            poll_timeout_ms: 8_000,
            cooldown_ms: 15_000,
            grace_ms: 1_000,
            confirm_timeout_ms: 10_000,
            breathing_ms: 120_000,
        }
    }
}

impl TimingSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn breathing(&self) -> Duration {
        Duration::from_millis(self.breathing_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    pub api_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub oembed_url: String,
    pub request_timeout_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai/v1/chat/completions".into(),
            model: "llama3-70b-8192".into(),
            api_key_env: "GROQ_API_KEY".into(),
            oembed_url: "https://www.youtube.com/oembed".into(),
            request_timeout_ms: 60_000,
        }
    }
}

impl LlmSettings {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeechBackendSettings {
    pub enabled: bool,
    pub program: String,
    pub args: Vec<String>,
}

impl Default for SpeechBackendSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "espeak".into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NarrationSettings {
    pub language: String,
    pub preferred_provider: String,
    pub muted: bool,
    pub speech: SpeechBackendSettings,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            language: "en".into(),
            preferred_provider: "Google".into(),
            muted: false,
            speech: SpeechBackendSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub backend: BackendSettings,
    pub timing: TimingSettings,
    pub llm: LlmSettings,
    pub narration: NarrationSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(err) => {
                    log::warn!(
                        "Ignoring malformed settings at {}: {err}; using defaults",
                        path.display()
                    );
                    UserSettings::default()
                }
            }
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Opens the store at `$EMOLEARN_SETTINGS`, or the default file in the
    /// working directory.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(SETTINGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        Self::new(path)
    }

    /// In-memory store that is never written back; for tests and embedding.
    pub fn ephemeral(data: UserSettings) -> Self {
        Self {
            path: PathBuf::new(),
            data: RwLock::new(data),
        }
    }

    pub fn snapshot(&self) -> UserSettings {
        self.read().clone()
    }

    pub fn narration(&self) -> NarrationSettings {
        self.read().narration.clone()
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        let mut guard = self.write();
        if guard.narration.muted == muted {
            return Ok(());
        }
        guard.narration.muted = muted;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
