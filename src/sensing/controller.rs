use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::SensorConfiguration;

use super::backend::{EmotionBackend, SensorKind};
use super::loop_worker::{polling_loop, PollTiming, PolledReading};
use super::source::EmotionSource;

/// Owns the polling task for the current sensor configuration.
///
/// Each applied configuration gets a fresh generation number; readings from
/// an older generation are stale and must be discarded by the receiver.
pub struct SensingController {
    backend: Arc<dyn EmotionBackend>,
    source: EmotionSource,
    readings: UnboundedSender<PolledReading>,
    timing: PollTiming,
    config: SensorConfiguration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SensingController {
    pub fn new(
        backend: Arc<dyn EmotionBackend>,
        readings: UnboundedSender<PolledReading>,
        timing: PollTiming,
    ) -> Self {
        Self {
            source: EmotionSource::new(backend.clone()),
            backend,
            readings,
            timing,
            config: SensorConfiguration::default(),
            generation: 0,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn config(&self) -> SensorConfiguration {
        self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn is_polling(&self) -> bool {
        self.handle.is_some()
    }

    /// Switches to `config`: stops the old loop, then starts a new one unless
    /// every sensor is off. Returns false when nothing changed.
    pub async fn apply(&mut self, config: SensorConfiguration) -> Result<bool> {
        if config == self.config && (self.is_polling() || config.is_suspended()) {
            return Ok(false);
        }

        self.stop_sensing().await?;
        self.config = config;
        self.generation = self.generation.wrapping_add(1);

        if config.is_suspended() {
            info!("All sensors off; emotion polling suspended");
            return Ok(true);
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(polling_loop(
            self.source.clone(),
            config,
            self.generation,
            self.timing,
            self.readings.clone(),
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(true)
    }

    pub async fn stop_sensing(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("polling loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }

    /// Fire-and-forget toggle notification; failures are only logged.
    pub fn notify_toggle(&self, sensor: SensorKind, enabled: bool) {
        let backend = self.backend.clone();
        tokio::spawn(async move {
            match backend.notify_sensor(sensor, enabled).await {
                Ok(()) => info!("Backend {} state updated: {}", sensor.as_str(), enabled),
                Err(err) => warn!("Failed to notify backend about {} state: {err:#}", sensor.as_str()),
            }
        });
    }
}
