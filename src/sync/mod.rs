//! Background sync module for timeline refresh

use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::api::PageFetcher;
use crate::cache::LocalCache;
use crate::models::TimelineKey;
use crate::timeline::{LoadOutcome, TimelineRegistry};

/// Sync manager for background timeline updates
pub struct SyncManager<F, C> {
    registry: Arc<TimelineRegistry<F, C>>,
}

impl<F: PageFetcher, C: LocalCache> SyncManager<F, C> {
    /// Create a new sync manager
    pub const fn new(registry: Arc<TimelineRegistry<F, C>>) -> Self {
        Self { registry }
    }

    /// Timelines being synced
    pub const fn registry(&self) -> &Arc<TimelineRegistry<F, C>> {
        &self.registry
    }

    /// Refresh all open timelines once
    pub async fn refresh_all(&self) -> Vec<(TimelineKey, LoadOutcome)> {
        let mut outcomes = Vec::new();

        for paginator in self.registry.paginators() {
            let outcome = paginator.refresh().await;
            if outcome == LoadOutcome::Failed {
                tracing::warn!(
                    "Failed to refresh {}: {}",
                    paginator.key(),
                    paginator.load_state().label()
                );
            }
            outcomes.push((paginator.key().clone(), outcome));
        }

        outcomes
    }

    /// Start a background refresh loop
    pub async fn start_background_refresh(self: Arc<Self>, interval_secs: u64) {
        if interval_secs == 0 {
            return; // Manual refresh only
        }

        self.run_every(Duration::from_secs(interval_secs)).await;
    }

    async fn run_every(&self, period: Duration) {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let outcomes = self.refresh_all().await;
            let failed = outcomes
                .iter()
                .filter(|(_, outcome)| *outcome == LoadOutcome::Failed)
                .count();
            if failed > 0 {
                tracing::error!("Background refresh failed for {} timelines", failed);
            } else {
                tracing::debug!("Background refresh of {} timelines done", outcomes.len());
            }
        }
    }
}
