use serde::Serialize;

pub const MIN_AGE_DAYS: i64 = 7;
pub const DECAY_HALF_LIFE_DAYS: f64 = 60.0;
pub const DROP_THRESHOLD: f64 = 0.05;
pub const CLUSTER_COSINE_THRESHOLD: f64 = 0.88;
pub const MIN_CLUSTER_SIZE: usize = 3;
pub const CRITICAL_TAG: &str = "critical";
pub const MAX_CANDIDATES_PER_RUN: usize = 1000;

/// Outcome of one `compact(user_id)` run (§4.8).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompactionSummary {
    pub user_id: String,
    pub candidates_scanned: usize,
    pub dropped: usize,
    pub clusters_consolidated: usize,
    pub memories_deleted: usize,
    pub memories_created: usize,
    pub dry_run: bool,
}
