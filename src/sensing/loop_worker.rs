use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::{EmotionLabel, EmotionReading, EndpointKind, SensorConfiguration};

use super::source::EmotionSource;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// A reading tagged with the configuration generation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PolledReading {
    pub generation: u64,
    pub config: SensorConfiguration,
    pub reading: EmotionReading,
}

#[derive(Debug, Clone, Copy)]
pub struct PollTiming {
    pub interval: Duration,
    pub timeout: Duration,
    pub verbose: bool,
}

/// Polls `source` for one sensor configuration until cancelled.
///
/// Ticks run back to back on this task, so at most one request is in flight
/// per configuration. A tick that outlives `timing.timeout` resolves to
/// `Unknown`.
pub async fn polling_loop(
    source: EmotionSource,
    config: SensorConfiguration,
    generation: u64,
    timing: PollTiming,
    readings: UnboundedSender<PolledReading>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(timing.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    log_info!(
        "polling {:?} every {:?} (generation {generation})",
        config.endpoint(),
        timing.interval
    );

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let reading = tokio::select! {
            _ = cancel_token.cancelled() => break,
            outcome = tokio::time::timeout(timing.timeout, source.poll(config)) => match outcome {
                Ok(Some(reading)) => reading,
                Ok(None) => break,
                Err(_) => {
                    log_warn!("emotion poll exceeded {:?}; reporting Unknown", timing.timeout);
                    EmotionReading::new(EmotionLabel::Unknown, EndpointKind::Unavailable)
                }
            },
        };

        ticks = ticks.wrapping_add(1);
        if timing.verbose {
            log_info!("tick #{ticks}: {} via {:?}", reading.label, reading.source);
        } else {
            log_debug!("tick #{ticks}: {} via {:?}", reading.label, reading.source);
        }

        let polled = PolledReading {
            generation,
            config,
            reading,
        };
        if readings.send(polled).is_err() {
            break;
        }
    }

    log_info!("polling loop for generation {generation} shutting down");
}
