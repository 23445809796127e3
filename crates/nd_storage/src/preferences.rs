use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use nd_core::{NewsPreferences, PreferenceSource, Result};
use tokio::sync::RwLock;

/// Preference records held in memory. User/account persistence is owned by
/// an external system; this is the stand-in the scheduler enumerates, and
/// the CLI loads it from a JSON file.
#[derive(Clone, Default)]
pub struct MemoryPreferences {
    records: Arc<RwLock<Vec<NewsPreferences>>>,
}

impl MemoryPreferences {
    pub fn new(records: Vec<NewsPreferences>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Load a JSON array of preference records.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<NewsPreferences> = serde_json::from_str(&raw)?;
        Ok(Self::new(records))
    }

    pub async fn push(&self, prefs: NewsPreferences) {
        self.records.write().await.push(prefs);
    }
}

#[async_trait]
impl PreferenceSource for MemoryPreferences {
    async fn list_preferences(&self) -> Result<Vec<NewsPreferences>> {
        Ok(self.records.read().await.clone())
    }
}
