use std::sync::Arc;

use crate::models::{EmotionLabel, EmotionReading, EndpointKind, SensorConfiguration};

use super::backend::EmotionBackend;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Produces one reading per polling tick for a sensor configuration.
///
/// Providers are tried in order: the endpoint selected by the
/// configuration, then the latest persisted record. When both fail the
/// reading degrades to `Unknown`; errors never reach the caller.
#[derive(Clone)]
pub struct EmotionSource {
    backend: Arc<dyn EmotionBackend>,
}

impl EmotionSource {
    pub fn new(backend: Arc<dyn EmotionBackend>) -> Self {
        Self { backend }
    }

    pub fn provider_chain(config: SensorConfiguration) -> [EndpointKind; 2] {
        [config.endpoint(), EndpointKind::Latest]
    }

    /// One polling tick. Suspended configurations issue no request.
    pub async fn poll(&self, config: SensorConfiguration) -> Option<EmotionReading> {
        if config.is_suspended() {
            return None;
        }
        Some(self.read(config).await)
    }

    pub async fn read(&self, config: SensorConfiguration) -> EmotionReading {
        for endpoint in Self::provider_chain(config) {
            match self.backend.fetch_label(endpoint).await {
                Ok(label) => {
                    log_debug!("{endpoint:?} reported {label}");
                    return EmotionReading::new(label, endpoint);
                }
                Err(err) => {
                    log_warn!("emotion fetch from {endpoint:?} failed: {err:#}");
                }
            }
        }
        EmotionReading::new(EmotionLabel::Unknown, EndpointKind::Unavailable)
    }
}
