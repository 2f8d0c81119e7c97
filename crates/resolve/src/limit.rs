//! Per-source rate limiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between live calls to the same source.
/// Cache hits never pass through here, so a warm catalog makes no source
/// wait at all.
#[derive(Debug, Clone)]
pub struct RateGate {
    min_interval: Duration,
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<Option<Instant>>>>>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, slots: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Wait until the source is allowed another live call, then claim the
    /// slot. Each source has its own lock, held across the sleep: callers to
    /// the same source queue up, while every other source passes unhindered.
    pub async fn wait(&self, source: &str) {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(source.to_string()).or_default())
        };
        let mut last_call = slot.lock().await;
        if let Some(last) = *last_call {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tokio::time::sleep(ready_at - now).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_second_call_waits_out_the_interval() {
        let gate = RateGate::new(Duration::from_millis(500));
        let start = Instant::now();
        gate.wait("openlibrary").await;
        gate.wait("openlibrary").await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_are_gated_independently() {
        let gate = RateGate::new(Duration::from_millis(500));
        let start = Instant::now();
        gate.wait("openlibrary").await;
        gate.wait("googlebooks").await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_a_sleeping_source_does_not_block_the_others() {
        let gate = RateGate::new(Duration::from_millis(500));
        gate.wait("openlibrary").await;
        let queued = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait("openlibrary").await }
        });
        // Let the queued call claim openlibrary's slot and start sleeping.
        tokio::task::yield_now().await;
        let start = Instant::now();
        gate.wait("loc").await;
        assert!(
            start.elapsed() < Duration::from_millis(500),
            "a first call to one source must not wait out another's interval",
        );
        queued.await.unwrap();
    }
}
