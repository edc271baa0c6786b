use std::time::Duration;

use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle, time};

/// A single cancellable one-shot timer.
///
/// Every `arm` or `cancel` bumps the slot's generation. The scheduled task
/// carries the generation it was armed with, and the owner only honours a
/// firing whose generation is still current, so a timer that was superseded
/// after its event was already queued is recognised and dropped.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `make(generation)` to be sent on `tx` after `delay`,
    /// replacing whatever this slot had pending.
    pub fn arm<E, F>(&mut self, delay: Duration, tx: &UnboundedSender<E>, make: F) -> u64
    where
        E: Send + 'static,
        F: FnOnce(u64) -> E + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        let tx = tx.clone();
        self.handle = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = tx.send(make(generation));
        }));
        generation
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Consumes a firing. Returns false for stale generations.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.handle.is_none() || generation != self.generation {
            return false;
        }
        self.handle = None;
        true
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
