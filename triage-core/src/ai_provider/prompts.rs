use crate::cluster::Cluster;
use crate::metrics::Metrics;

const TASK_FRAMING: &str =
    "Suggest probable root causes and reasoning based on the following server state.";

const OUTPUT_CONTRACT: &str = "Return results ONLY as a valid JSON object with 'root_causes' \
(array of objects with 'cause', 'description', 'confidence' between 0 and 1, and 'severity') \
and 'recommendations' (array of strings). Do not wrap the JSON in markdown or add any text \
before or after it.";

pub const CLUSTER_LINE_PREFIX: &str = "- [Count: ";

/// Serializes clusters and metrics into the instruction sent to the
/// reasoning service. Output is fully determined by its inputs.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_clusters: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self { max_clusters: 10 }
    }
}

impl PromptBuilder {
    pub fn new(max_clusters: usize) -> Self {
        Self { max_clusters }
    }

    pub fn max_clusters(&self) -> usize {
        self.max_clusters
    }

    /// Clusters past the cap are dropped without notice; callers wanting full
    /// coverage must pre-filter.
    pub fn build(&self, clusters: &[Cluster], metrics: &Metrics) -> String {
        build(clusters, metrics, self.max_clusters)
    }
}

pub fn build(clusters: &[Cluster], metrics: &Metrics, max_clusters: usize) -> String {
    let mut prompt = String::new();
    prompt.push_str(TASK_FRAMING);
    prompt.push_str("\n\n");

    prompt.push_str("--- Metric Summary ---\n");
    // BTreeMap-backed, so key order is stable.
    let metrics_json = serde_json::to_string_pretty(metrics).unwrap_or_else(|_| "{}".to_string());
    prompt.push_str(&metrics_json);
    prompt.push_str("\n\n");

    prompt.push_str("--- Clustered Log Events ---\n");
    for cluster in clusters.iter().take(max_clusters) {
        prompt.push_str(&format!(
            "{}{}, Severity: {}] {}\n",
            CLUSTER_LINE_PREFIX,
            cluster.occurrence_count,
            cluster.severity,
            single_line(&cluster.representative_snippet)
        ));
    }

    prompt.push('\n');
    prompt.push_str(OUTPUT_CONTRACT);
    prompt
}

// A snippet spanning lines would break the one-cluster-per-line layout.
fn single_line(snippet: &str) -> String {
    snippet.split_whitespace().collect::<Vec<_>>().join(" ")
}
