use chrono::{DateTime, Utc};

use crate::types::{Hit, Weights};

const HALF_LIFE_DAYS: f64 = 30.0;

/// `time_decay = exp(-age_days/half_life)` (§4.6).
pub fn time_decay(timestamp: &str, now: DateTime<Utc>) -> f64 {
    let Ok(ts) = DateTime::parse_from_rfc3339(timestamp) else {
        return 0.0;
    };
    let age_days = (now - ts.with_timezone(&Utc)).num_seconds() as f64 / 86_400.0;
    (-age_days.max(0.0) / HALF_LIFE_DAYS).exp()
}

/// `w_sem*semantic + w_time*time_decay + w_imp*importance + w_emo*emotional_alignment` (§4.6).
#[allow(clippy::too_many_arguments)]
pub fn combined_score(
    weights: &Weights,
    semantic: f64,
    timestamp: &str,
    importance: f64,
    emotional_alignment: f64,
    now: DateTime<Utc>,
) -> f64 {
    weights.semantic * semantic
        + weights.time * time_decay(timestamp, now)
        + weights.importance * importance
        + weights.emotional * emotional_alignment
}

/// Dedup by `id`, keeping the highest-scored occurrence; tie-break by
/// `timestamp` descending, then `id` lexicographically (§4.6).
pub fn dedup_and_rank(mut hits: Vec<Hit>) -> Vec<Hit> {
    let mut seen = std::collections::HashMap::new();
    for (idx, hit) in hits.iter().enumerate() {
        seen.entry(hit.memory_id.clone())
            .and_modify(|best: &mut (usize, f64)| {
                if hit.score > best.1 {
                    *best = (idx, hit.score);
                }
            })
            .or_insert((idx, hit.score));
    }
    let keep: std::collections::HashSet<usize> = seen.values().map(|(idx, _)| *idx).collect();

    let mut idx = 0;
    hits.retain(|_| {
        let keep_this = keep.contains(&idx);
        idx += 1;
        keep_this
    });

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
            .then_with(|| a.memory_id.cmp(&b.memory_id))
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HitSource;

    #[test]
    fn time_decay_is_one_at_zero_age() {
        let now = Utc::now();
        let decay = time_decay(&now.to_rfc3339(), now);
        assert!((decay - 1.0).abs() < 1e-9);
    }

    #[test]
    fn time_decay_shrinks_with_age() {
        let now = Utc::now();
        let old = (now - chrono::Duration::days(60)).to_rfc3339();
        let decay = time_decay(&old, now);
        assert!(decay < 0.2);
    }

    #[test]
    fn dedup_keeps_highest_score_occurrence() {
        let hits = vec![
            Hit {
                memory_id: "mem_a".to_string(),
                content: "x".to_string(),
                score: 0.4,
                source: HitSource::Semantic,
                metadata: serde_json::json!({}),
                timestamp: "2026-01-01T00:00:00Z".to_string(),
            },
            Hit {
                memory_id: "mem_a".to_string(),
                content: "x".to_string(),
                score: 0.9,
                source: HitSource::Episodic,
                metadata: serde_json::json!({}),
                timestamp: "2026-01-02T00:00:00Z".to_string(),
            },
        ];
        let result = dedup_and_rank(hits);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].score, 0.9);
    }
}
