use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{EmotionLabel, EndpointKind};

use super::history::EmotionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Camera,
    Microphone,
}

impl SensorKind {
    pub fn path(&self) -> &'static str {
        match self {
            SensorKind::Camera => "/api/sensors/camera",
            SensorKind::Microphone => "/api/sensors/microphone",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Camera => "camera",
            SensorKind::Microphone => "microphone",
        }
    }
}

/// The external emotion-sensing service.
#[async_trait]
pub trait EmotionBackend: Send + Sync {
    /// Reads the label currently reported by `endpoint`.
    async fn fetch_label(&self, endpoint: EndpointKind) -> Result<EmotionLabel>;

    /// Tells the backend a sensor was toggled.
    async fn notify_sensor(&self, sensor: SensorKind, enabled: bool) -> Result<()>;

    /// All persisted emotion records, oldest first.
    async fn emotion_history(&self) -> Result<Vec<EmotionRecord>>;
}

#[derive(Debug, Deserialize)]
struct EmotionPayload {
    #[serde(default)]
    emotion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatestEmotionPayload {
    #[serde(default)]
    final_emotion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SensorStatePayload {
    #[serde(default)]
    camera_enabled: bool,
    #[serde(default)]
    microphone_enabled: bool,
}

pub struct HttpEmotionBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEmotionBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl EmotionBackend for HttpEmotionBackend {
    async fn fetch_label(&self, endpoint: EndpointKind) -> Result<EmotionLabel> {
        let path = endpoint
            .path()
            .ok_or_else(|| anyhow!("{endpoint:?} has no remote endpoint"))?;

        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {path} returned an error status"))?;

        // A body without the field is a valid "nothing detected" answer.
        let raw = match endpoint {
            EndpointKind::Latest => response
                .json::<LatestEmotionPayload>()
                .await
                .with_context(|| format!("malformed body from {path}"))?
                .final_emotion,
            _ => response
                .json::<EmotionPayload>()
                .await
                .with_context(|| format!("malformed body from {path}"))?
                .emotion,
        };

        Ok(raw.map(|s| EmotionLabel::parse(&s)).unwrap_or_default())
    }

    async fn notify_sensor(&self, sensor: SensorKind, enabled: bool) -> Result<()> {
        let path = sensor.path();
        let state: SensorStatePayload = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .send()
            .await
            .with_context(|| format!("POST {path} failed"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("malformed body from {path}"))?;

        let reported = match sensor {
            SensorKind::Camera => state.camera_enabled,
            SensorKind::Microphone => state.microphone_enabled,
        };
        if reported != enabled {
            log::warn!(
                "Backend reports {} enabled={} after toggle, expected {}",
                sensor.as_str(),
                reported,
                enabled
            );
        }
        Ok(())
    }

    async fn emotion_history(&self) -> Result<Vec<EmotionRecord>> {
        let records = self
            .client
            .get(self.url("/api/emotion/all"))
            .send()
            .await
            .context("GET /api/emotion/all failed")?
            .error_for_status()?
            .json::<Vec<EmotionRecord>>()
            .await
            .context("malformed emotion history")?;
        Ok(records)
    }
}
