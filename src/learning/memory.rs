//! Agent Memory
//!
//! Bounded history of query successes and failures, plus the schema and
//! query-pattern caches used to improve later plans.
//!
//! Only the query tool writes to memory. Everything else reads snapshots
//! through [`MemoryHandle`].

use crate::error::Result;
use crate::learning::error_classifier::ErrorKind;
use crate::provider::CloudProvider;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub const MAX_SUCCESSES: usize = 100;
pub const MAX_FAILURES: usize = 50;
pub const MAX_PATTERNS: usize = 200;
pub const MAX_PATTERN_EXAMPLES: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySuccess {
    pub original_intent: String,
    pub generated_query: String,
    pub result_count: usize,
    pub provider: CloudProvider,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_used: Option<String>,
    #[serde(default)]
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryFailure {
    pub original_intent: String,
    pub generated_query: String,
    pub error_message: String,
    pub error_type: ErrorKind,
    pub provider: CloudProvider,
    pub timestamp: DateTime<Utc>,
    pub lesson_learned: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub provider: CloudProvider,
    pub description: String,
    pub last_updated: DateTime<Utc>,
}

impl TableSchema {
    pub fn cache_key(provider: CloudProvider, table: &str) -> String {
        format!("{}.{}", provider, table)
    }
}

/// A query that answered a given intent before.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryPattern {
    pub id: String,
    pub intent: String,
    pub template: String,
    pub provider: CloudProvider,
    pub success_rate: f64,
    pub usage_count: u32,
    #[serde(default)]
    pub examples: Vec<String>,
    /// Tables referenced by the template.
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl QueryPattern {
    pub fn cache_key(provider: CloudProvider, intent: &str) -> String {
        format!("{}:{}", provider, normalize_intent(intent))
    }
}

fn normalize_intent(intent: &str) -> String {
    intent.to_lowercase().split_whitespace().join(" ")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMemory {
    #[serde(default)]
    pub schemas: HashMap<String, TableSchema>,
    #[serde(default)]
    pub patterns: HashMap<String, QueryPattern>,
    #[serde(default)]
    pub successes: Vec<QuerySuccess>,
    #[serde(default)]
    pub failures: Vec<QueryFailure>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot from disk. A missing file yields empty memory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No agent memory at {}, starting fresh", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let mut memory: AgentMemory = serde_json::from_str(&data)?;
        // Snapshots written by other tools may exceed the caps.
        memory.trim();
        info!(
            "Loaded agent memory: {} successes, {} failures, {} schemas, {} patterns",
            memory.successes.len(),
            memory.failures.len(),
            memory.schemas.len(),
            memory.patterns.len()
        );
        Ok(memory)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        debug!("Saved agent memory to {}", path.display());
        Ok(())
    }

    pub fn record_success(&mut self, success: QuerySuccess) {
        self.successes.push(success);
        self.trim();
        self.last_update = Some(Utc::now());
    }

    pub fn record_failure(&mut self, failure: QueryFailure) {
        self.failures.push(failure);
        self.trim();
        self.last_update = Some(Utc::now());
    }

    fn trim(&mut self) {
        if self.successes.len() > MAX_SUCCESSES {
            let excess = self.successes.len() - MAX_SUCCESSES;
            self.successes.drain(..excess);
        }
        if self.failures.len() > MAX_FAILURES {
            let excess = self.failures.len() - MAX_FAILURES;
            self.failures.drain(..excess);
        }
    }

    /// Distinct lessons, most recent first.
    pub fn recent_lessons(&self, limit: usize) -> Vec<String> {
        self.failures
            .iter()
            .rev()
            .map(|f| f.lesson_learned.clone())
            .unique()
            .take(limit)
            .collect()
    }

    pub fn schema(&self, provider: CloudProvider, table: &str) -> Option<&TableSchema> {
        self.schemas.get(&TableSchema::cache_key(provider, table))
    }

    pub fn store_schema(&mut self, schema: TableSchema) {
        let key = TableSchema::cache_key(schema.provider, &schema.table_name);
        self.schemas.insert(key, schema);
        self.last_update = Some(Utc::now());
    }

    pub fn find_pattern(&self, provider: CloudProvider, intent: &str) -> Option<&QueryPattern> {
        self.patterns.get(&QueryPattern::cache_key(provider, intent))
    }

    /// Best patterns for a provider, highest success rate then most used.
    pub fn top_patterns(&self, provider: CloudProvider, limit: usize) -> Vec<&QueryPattern> {
        self.patterns
            .values()
            .filter(|p| p.provider == provider)
            .sorted_by(|a, b| {
                b.success_rate
                    .partial_cmp(&a.success_rate)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.usage_count.cmp(&a.usage_count))
                    .then(a.intent.cmp(&b.intent))
            })
            .take(limit)
            .collect()
    }

    /// Fold one execution outcome into the pattern cache.
    ///
    /// Successes create or refresh the pattern for the intent; failures only
    /// lower the success rate of an existing pattern. Returns the id of the
    /// pattern that already existed for this intent, if any.
    pub fn learn_pattern(
        &mut self,
        provider: CloudProvider,
        intent: &str,
        query: &str,
        tables: Vec<String>,
        success: bool,
    ) -> Option<String> {
        let key = QueryPattern::cache_key(provider, intent);
        let now = Utc::now();

        if let Some(pattern) = self.patterns.get_mut(&key) {
            let previous_uses = pattern.usage_count as f64;
            pattern.usage_count += 1;
            let hit = if success { 1.0 } else { 0.0 };
            pattern.success_rate = (pattern.success_rate * previous_uses + hit) / pattern.usage_count as f64;
            pattern.last_used = now;
            if success {
                pattern.template = query.to_string();
                pattern.tags = tables;
                if !pattern.examples.iter().any(|e| e == intent) {
                    pattern.examples.push(intent.to_string());
                    if pattern.examples.len() > MAX_PATTERN_EXAMPLES {
                        pattern.examples.remove(0);
                    }
                }
            }
            return Some(pattern.id.clone());
        }

        if !success {
            return None;
        }

        if self.patterns.len() >= MAX_PATTERNS {
            let stalest = self
                .patterns
                .iter()
                .min_by_key(|(_, p)| p.last_used)
                .map(|(k, _)| k.clone());
            if let Some(k) = stalest {
                self.patterns.remove(&k);
            }
        }

        self.patterns.insert(
            key,
            QueryPattern {
                id: uuid::Uuid::new_v4().to_string(),
                intent: intent.to_string(),
                template: query.to_string(),
                provider,
                success_rate: 1.0,
                usage_count: 1,
                examples: vec![intent.to_string()],
                tags: tables,
                created_at: now,
                last_used: now,
            },
        );
        None
    }
}

/// Shared, cloneable handle to one [`AgentMemory`].
///
/// Several agents may share a handle; writes are serialized by the mutex.
#[derive(Debug, Clone, Default)]
pub struct MemoryHandle {
    inner: Arc<Mutex<AgentMemory>>,
}

impl MemoryHandle {
    pub fn new(memory: AgentMemory) -> Self {
        Self {
            inner: Arc::new(Mutex::new(memory)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AgentMemory> {
        // A panic inside a write leaves the vectors valid, so keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> AgentMemory {
        self.lock().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&AgentMemory) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut AgentMemory) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.snapshot().save(path)
    }
}
