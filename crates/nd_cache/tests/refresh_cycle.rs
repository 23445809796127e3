use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nd_cache::{NewsService, RefreshConfig, RefreshScheduler, TickSummary};
use nd_core::types::ArticleSource;
use nd_core::{
    ArticleStore, CachedArticle, Category, Error, FetchedBatch, Headline, NewsPreferences,
    Partition, PreferenceSource, Result,
};
use nd_core::NewsSource;
use nd_storage::{MemoryPreferences, MemoryStore};

struct ScriptedSource {
    delay: Duration,
    fail_category: Option<Category>,
    calls: Mutex<Vec<Partition>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            fail_category: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn failing_for(mut self, category: Category) -> Self {
        self.fail_category = Some(category);
        self
    }

    fn calls(&self) -> Vec<Partition> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NewsSource for ScriptedSource {
    async fn top_headlines(&self, partition: &Partition, _page_size: usize) -> Result<FetchedBatch> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(partition.clone());
        if self.fail_category == Some(partition.category) {
            return Err(Error::Upstream("scripted failure".to_string()));
        }
        Ok(FetchedBatch {
            total_results: 1,
            articles: vec![Headline {
                source: ArticleSource::default(),
                author: None,
                title: format!("{} headline", partition.category),
                description: None,
                url: format!("http://news.example/{}/{}", partition.category, partition.country),
                image_url: None,
                published_at: Some(Utc::now()),
                content: None,
            }],
        })
    }

    async fn search_everything(
        &self,
        _query: &str,
        _language: &str,
        _page_size: usize,
    ) -> Result<FetchedBatch> {
        Ok(FetchedBatch::default())
    }
}

fn prefs(categories: Vec<Category>, country: &str, language: &str) -> NewsPreferences {
    NewsPreferences {
        categories,
        country: Some(country.to_string()),
        language: Some(language.to_string()),
    }
}

fn instant_config() -> RefreshConfig {
    RefreshConfig {
        period: Duration::from_secs(15 * 60),
        pacing: Duration::ZERO,
    }
}

fn build_scheduler(
    store: Arc<MemoryStore>,
    source: Arc<ScriptedSource>,
    records: Vec<NewsPreferences>,
    config: RefreshConfig,
) -> RefreshScheduler {
    let service = Arc::new(NewsService::new(store, source));
    let preferences = Arc::new(MemoryPreferences::new(records));
    RefreshScheduler::with_config(service, preferences, config)
}

#[tokio::test]
async fn tick_refreshes_each_unique_partition_once() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new());
    let scheduler = build_scheduler(
        store.clone(),
        source.clone(),
        vec![
            prefs(vec![Category::Technology], "us", "en"),
            prefs(vec![Category::Technology], "us", "en"),
            prefs(vec![Category::Health], "gb", "en"),
        ],
        instant_config(),
    );

    let summary = scheduler.run_once().await.expect("tick should run");
    assert_eq!(
        summary,
        TickSummary {
            partitions: 2,
            refreshed: 2,
            failed: 0,
            swept: 0,
        }
    );

    // Two users with identical preferences cost one upstream call.
    assert_eq!(source.calls().len(), 2);

    let tech = Partition::new(Category::Technology, "us", "en");
    let health = Partition::new(Category::Health, "gb", "en");
    assert_eq!(store.count_partition(&tech).await.unwrap(), 1);
    assert_eq!(store.count_partition(&health).await.unwrap(), 1);
}

#[tokio::test]
async fn overlapping_tick_is_dropped() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new().with_delay(Duration::from_millis(50)));
    let scheduler = build_scheduler(
        store,
        source.clone(),
        vec![
            prefs(vec![Category::Technology], "us", "en"),
            prefs(vec![Category::Sports], "us", "en"),
        ],
        instant_config(),
    );

    let (first, second) = tokio::join!(scheduler.run_once(), scheduler.run_once());
    assert!(first.is_some());
    assert!(second.is_none(), "second tick should be dropped, not queued");

    // No duplicate upstream calls from the dropped tick.
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test]
async fn per_partition_failures_do_not_abort_the_tick() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new().failing_for(Category::Sports));
    let scheduler = build_scheduler(
        store.clone(),
        source,
        vec![
            prefs(vec![Category::Sports], "us", "en"),
            prefs(vec![Category::Science], "us", "en"),
        ],
        instant_config(),
    );

    let summary = scheduler.run_once().await.unwrap();
    assert_eq!(summary.refreshed, 1);
    assert_eq!(summary.failed, 1);

    let science = Partition::new(Category::Science, "us", "en");
    assert_eq!(store.count_partition(&science).await.unwrap(), 1);
}

#[tokio::test]
async fn tick_sweeps_expired_entries() {
    let store = Arc::new(MemoryStore::new());
    let expired_partition = Partition::new(Category::Business, "us", "en");
    let old = Utc::now() - chrono::Duration::minutes(30);
    store
        .insert_articles(&[CachedArticle::from_headline(
            Headline {
                source: ArticleSource::default(),
                author: None,
                title: "stale".to_string(),
                description: None,
                url: "http://news.example/stale".to_string(),
                image_url: None,
                published_at: Some(old),
                content: None,
            },
            &expired_partition,
            old,
            old + chrono::Duration::minutes(15),
        )])
        .await
        .unwrap();

    let source = Arc::new(ScriptedSource::new());
    let scheduler = build_scheduler(
        store.clone(),
        source,
        vec![prefs(vec![Category::Technology], "us", "en")],
        instant_config(),
    );

    let summary = scheduler.run_once().await.unwrap();
    assert_eq!(summary.swept, 1);
    assert_eq!(store.count_partition(&expired_partition).await.unwrap(), 0);
}

#[tokio::test]
async fn empty_preferences_skip_the_tick() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new());
    let scheduler = build_scheduler(store, source.clone(), Vec::new(), instant_config());

    let summary = scheduler.run_once().await.unwrap();
    assert_eq!(summary, TickSummary::default());
    assert!(source.calls().is_empty());
}

/// Preference source that counts enumerations. Every tick lists preferences
/// before deciding anything, so the count is the number of ticks that ran.
struct CountingPreferences {
    records: Vec<NewsPreferences>,
    calls: AtomicUsize,
}

#[async_trait]
impl PreferenceSource for CountingPreferences {
    async fn list_preferences(&self) -> Result<Vec<NewsPreferences>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

#[tokio::test]
async fn start_is_idempotent_and_stop_halts_future_ticks() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new());
    let preferences = Arc::new(CountingPreferences {
        records: vec![prefs(vec![Category::General], "us", "en")],
        calls: AtomicUsize::new(0),
    });
    let service = Arc::new(NewsService::new(store, source.clone()));
    let scheduler = RefreshScheduler::with_config(
        service,
        preferences.clone(),
        RefreshConfig {
            period: Duration::from_millis(25),
            pacing: Duration::ZERO,
        },
    );

    scheduler.start();
    scheduler.start(); // no-op
    assert!(scheduler.is_started());

    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.stop();
    assert!(!scheduler.is_started());

    // Let any tick that was already in flight at stop() finish.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let ticks_at_stop = preferences.calls.load(Ordering::SeqCst);
    assert!(ticks_at_stop >= 2, "expected repeated ticks, saw {}", ticks_at_stop);

    // The first tick filled the cache, so later ticks were cache hits; the
    // upstream source was only reached once.
    assert_eq!(source.calls().len(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        preferences.calls.load(Ordering::SeqCst),
        ticks_at_stop,
        "ticks continued after stop"
    );
}
