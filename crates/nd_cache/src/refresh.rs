use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nd_core::types::{DEFAULT_COUNTRY, DEFAULT_LANGUAGE};
use nd_core::{Category, NewsPreferences, Partition, PreferenceSource};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::service::NewsService;

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Tick period, measured from scheduler start rather than from the end
    /// of the previous run.
    pub period: Duration,
    /// Delay between consecutive upstream calls within one tick.
    pub pacing: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(15 * 60),
            pacing: Duration::from_secs(1),
        }
    }
}

/// Outcome of one refresh tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub partitions: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub swept: u64,
}

/// Expand preference records into the unique partitions a tick must
/// refresh: one per (category, country, language), first seen wins, with
/// defaults filled in for missing fields.
pub fn unique_partitions(prefs: &[NewsPreferences]) -> Vec<Partition> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for record in prefs {
        let country = record.country.as_deref().unwrap_or(DEFAULT_COUNTRY);
        let language = record.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
        let categories: &[Category] = if record.categories.is_empty() {
            &[Category::General]
        } else {
            &record.categories
        };
        for &category in categories {
            let partition = Partition::new(category, country, language);
            if seen.insert(partition.clone()) {
                unique.push(partition);
            }
        }
    }
    unique
}

struct Inner {
    service: Arc<NewsService>,
    preferences: Arc<dyn PreferenceSource>,
    config: RefreshConfig,
    running: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Background cache pre-warmer. One instance per process, constructed at
/// startup with its collaborators and held by the host's lifecycle code;
/// clones share the same timer and re-entrancy state.
///
/// Ticks never overlap: a tick requested while one is running is dropped,
/// not queued. `stop` cancels the timer only; an in-flight tick runs to
/// completion.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RefreshScheduler {
    pub fn new(service: Arc<NewsService>, preferences: Arc<dyn PreferenceSource>) -> Self {
        Self::with_config(service, preferences, RefreshConfig::default())
    }

    pub fn with_config(
        service: Arc<NewsService>,
        preferences: Arc<dyn PreferenceSource>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                preferences,
                config,
                running: AtomicBool::new(false),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Arm the periodic timer and run one tick immediately. Idempotent:
    /// calling it while armed is a logged no-op.
    pub fn start(&self) {
        let mut timer = self.inner.timer.lock().unwrap();
        if timer.is_some() {
            warn!("⚠️  cache refresh scheduler is already running");
            return;
        }

        info!(
            "🚀 starting cache refresh scheduler (every {}s)",
            self.inner.config.period.as_secs()
        );
        let scheduler = self.clone();
        *timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.inner.config.period);
            // A tick slower than the period is skipped by the re-entrancy
            // guard; don't let the timer stack the missed ones on top.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                // Each tick gets its own task so stopping the timer never
                // interrupts a run already in flight.
                let tick = scheduler.clone();
                tokio::spawn(async move {
                    tick.run_once().await;
                });
            }
        }));
    }

    /// Disarm the timer. Future ticks stop; an in-flight tick finishes.
    pub fn stop(&self) {
        if let Some(handle) = self.inner.timer.lock().unwrap().take() {
            handle.abort();
            info!("🛑 cache refresh scheduler stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner.timer.lock().unwrap().is_some()
    }

    /// Run one refresh tick. Returns `None` when a tick is already in
    /// progress and this request was dropped.
    pub async fn run_once(&self) -> Option<TickSummary> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("⏳ cache refresh already in progress, skipping");
            return None;
        }
        let _guard = RunningGuard(&self.inner.running);
        Some(self.refresh_all().await)
    }

    async fn refresh_all(&self) -> TickSummary {
        info!("🔄 starting cache refresh");

        let prefs = match self.inner.preferences.list_preferences().await {
            Ok(prefs) => prefs,
            Err(e) => {
                error!("failed to load user preferences: {}", e);
                return TickSummary::default();
            }
        };
        if prefs.is_empty() {
            info!("no user preferences found, skipping cache refresh");
            return TickSummary::default();
        }

        let partitions = unique_partitions(&prefs);
        info!(
            "📊 found {} unique preference combinations to refresh",
            partitions.len()
        );

        let mut refreshed = 0;
        let mut failed = 0;
        for (i, partition) in partitions.iter().enumerate() {
            match self.inner.service.fetch_partition(partition).await {
                Ok(_) => {
                    refreshed += 1;
                    debug!("✓ refreshed cache for {}", partition);
                }
                Err(e) => {
                    failed += 1;
                    warn!("✗ failed to refresh cache for {}: {}", partition, e);
                }
            }
            if i + 1 < partitions.len() {
                tokio::time::sleep(self.inner.config.pacing).await;
            }
        }

        let swept = match self.inner.service.clear_expired().await {
            Ok(count) => count,
            Err(e) => {
                warn!("cache sweep failed: {}", e);
                0
            }
        };

        info!(
            "✅ cache refresh complete: {} refreshed, {} failed, {} expired entries removed",
            refreshed, failed, swept
        );
        TickSummary {
            partitions: partitions.len(),
            refreshed,
            failed,
            swept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(
        categories: Vec<Category>,
        country: Option<&str>,
        language: Option<&str>,
    ) -> NewsPreferences {
        NewsPreferences {
            categories,
            country: country.map(str::to_string),
            language: language.map(str::to_string),
        }
    }

    #[test]
    fn identical_preferences_collapse_to_one_partition() {
        let records = vec![
            prefs(vec![Category::Technology], Some("us"), Some("en")),
            prefs(vec![Category::Technology], Some("us"), Some("en")),
        ];
        let partitions = unique_partitions(&records);
        assert_eq!(partitions, vec![Partition::new(Category::Technology, "us", "en")]);
    }

    #[test]
    fn every_category_of_a_user_becomes_a_partition() {
        let records = vec![prefs(
            vec![Category::Business, Category::Sports],
            Some("gb"),
            Some("en"),
        )];
        let partitions = unique_partitions(&records);
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].category, Category::Business);
        assert_eq!(partitions[1].category, Category::Sports);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let partitions = unique_partitions(&[prefs(vec![], None, None)]);
        assert_eq!(partitions, vec![Partition::new(Category::General, "us", "en")]);
    }

    #[test]
    fn first_seen_order_is_kept() {
        let records = vec![
            prefs(vec![Category::Sports], Some("us"), Some("en")),
            prefs(vec![Category::General], Some("us"), Some("en")),
            prefs(vec![Category::Sports], Some("us"), Some("en")),
        ];
        let partitions = unique_partitions(&records);
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].category, Category::Sports);
    }
}
