use crate::classification::{classify, Severity};
use crate::config::AnalysisConfig;
use crate::normalizer::PatternNormalizer;
use crate::parser::{parse_entries, LogEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Grouping key: normalized pattern plus the time window it fell into.
/// Entries without a timestamp share the `None` window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterKey {
    pub normalized_pattern: String,
    pub window_start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub key: ClusterKey,
    pub representative_snippet: String,
    pub occurrence_count: usize,
    pub severity: Severity,
    pub first_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub total_lines: usize,
    pub total_entries: usize,
    pub unique_clusters: usize,
}

impl ClusterSummary {
    pub fn from_clusters(total_lines: usize, clusters: &[Cluster]) -> Self {
        Self {
            total_lines,
            total_entries: clusters.iter().map(|c| c.occurrence_count).sum(),
            unique_clusters: clusters.len(),
        }
    }
}

/// Start of the window containing `ts`, aligned to multiples of `window_secs`
/// since the Unix epoch.
pub fn window_start(ts: DateTime<Utc>, window_secs: u64) -> DateTime<Utc> {
    let window = window_secs.max(1) as i64;
    let aligned = ts.timestamp().div_euclid(window) * window;
    DateTime::<Utc>::from_timestamp(aligned, 0).unwrap_or(ts)
}

/// Groups entries by (pattern, window), keeping first-seen order.
#[derive(Debug, Clone)]
pub struct ClusterAggregator {
    normalizer: PatternNormalizer,
    window_secs: u64,
    snippet_lines: usize,
    snippet_max_chars: usize,
}

impl Default for ClusterAggregator {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl ClusterAggregator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            normalizer: PatternNormalizer::new(config.pattern_max_len),
            window_secs: config.window_secs,
            snippet_lines: config.snippet_lines,
            snippet_max_chars: config.snippet_max_chars,
        }
    }

    pub fn with_window_secs(mut self, window_secs: u64) -> Self {
        self.window_secs = window_secs;
        self
    }

    pub fn key_for(&self, entry: &LogEntry) -> ClusterKey {
        ClusterKey {
            normalized_pattern: self.normalizer.normalize(entry),
            window_start: entry.timestamp.map(|ts| window_start(ts, self.window_secs)),
        }
    }

    pub fn aggregate<I>(&self, entries: I) -> Vec<Cluster>
    where
        I: IntoIterator<Item = LogEntry>,
    {
        let mut clusters: Vec<Cluster> = Vec::new();
        let mut index: HashMap<ClusterKey, usize> = HashMap::new();

        for entry in entries {
            if entry.raw_text.trim().is_empty() {
                continue;
            }

            let key = self.key_for(&entry);
            match index.get(&key) {
                // Severity and snippet stay as recorded on first sight.
                Some(&pos) => clusters[pos].occurrence_count += 1,
                None => {
                    index.insert(key.clone(), clusters.len());
                    clusters.push(Cluster {
                        key,
                        representative_snippet: self.snippet(&entry.raw_text),
                        occurrence_count: 1,
                        severity: classify(&entry.raw_text),
                        first_seen: entry.timestamp,
                    });
                }
            }
        }

        debug!("Aggregated entries into {} clusters", clusters.len());
        clusters
    }

    /// Parses raw text and aggregates the resulting entries.
    pub fn aggregate_text(&self, text: &str) -> Vec<Cluster> {
        self.aggregate(parse_entries(text))
    }

    fn snippet(&self, raw_text: &str) -> String {
        let joined = raw_text
            .lines()
            .take(self.snippet_lines.max(1))
            .collect::<Vec<_>>()
            .join(" ");
        if joined.chars().count() > self.snippet_max_chars {
            joined.chars().take(self.snippet_max_chars).collect()
        } else {
            joined
        }
    }
}
