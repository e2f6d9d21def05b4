//! Multi-signal ranking of retrieved candidates.
//!
//! Five sub-scores are blended into one final score:
//!
//! | signal | weight |
//! |--------|--------|
//! | Wilson lower bound of positive ratings | 0.10 |
//! | Bayesian average rating (÷5) | 0.10 |
//! | Popularity `1 − e^(−count/50)` | 0.05 |
//! | Semantic relevance `max(0, 1 − distance)` | 0.15 |
//! | Content quality (review synthesis / FAQ) | 0.60 |
//!
//! Candidates sort by descending score with ties broken by ascending product
//! id, so the order is total.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::document::{Metadata, RetrievalResult, metadata_str};

const WILSON_Z: f64 = 1.96;
const BAYES_PRIOR_MEAN: f64 = 3.0;
const BAYES_PRIOR_WEIGHT: f64 = 10.0;
const POPULARITY_SCALE: f64 = 50.0;

const DEFAULT_RATING: f64 = 2.5;
const MISSING_DISTANCE: f32 = 1.0;

const W_WILSON: f64 = 0.10;
const W_BAYES: f64 = 0.10;
const W_POPULARITY: f64 = 0.05;
const W_RELEVANCE: f64 = 0.15;
const W_QUALITY: f64 = 0.60;

/// A retrieved product with its final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub product_id: String,
    pub metadata: Metadata,
    /// Review-synthesis text from the index.
    pub document: String,
    pub distance: f32,
    pub score: f64,
}

/// Sub-scores behind a final score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub wilson: f64,
    pub bayesian: f64,
    pub popularity: f64,
    pub relevance: f64,
    pub content_quality: f64,
    pub total: f64,
}

/// Lower bound of the Wilson score interval for `positive` out of `total`.
pub fn wilson_lower_bound(positive: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let p = (positive / total).clamp(0.0, 1.0);
    let z2 = WILSON_Z * WILSON_Z;
    let centre = p + z2 / (2.0 * total);
    let margin = WILSON_Z * ((p * (1.0 - p) + z2 / (4.0 * total)) / total).sqrt();
    ((centre - margin) / (1.0 + z2 / total)).max(0.0)
}

/// Bayesian average toward a prior of 3.0 stars with weight 10, scaled to `[0, 1]`.
pub fn bayesian_rating(avg: f64, count: f64) -> f64 {
    (BAYES_PRIOR_MEAN * BAYES_PRIOR_WEIGHT + avg * count) / (BAYES_PRIOR_WEIGHT + count) / 5.0
}

pub fn popularity(count: f64) -> f64 {
    1.0 - (-count / POPULARITY_SCALE).exp()
}

pub fn relevance(distance: f32) -> f64 {
    (1.0 - f64::from(distance)).max(0.0)
}

pub fn content_quality(has_synthesis: bool, has_faq: bool) -> f64 {
    let mut quality = 0.0;
    if has_synthesis {
        quality += 0.3;
    }
    if has_faq {
        quality += 0.2;
    }
    if has_synthesis && has_faq {
        quality += 0.1;
    }
    quality
}

fn number(metadata: &Metadata, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| metadata.get(*k)).and_then(|v| v.as_f64())
}

/// `(avg, count)`, defaulting to `(2.5, 0)` unless both are usable numbers.
fn rating(metadata: &Metadata) -> (f64, f64) {
    let avg = number(metadata, &["rating_avg", "rating", "avg_rating"]);
    let count = number(metadata, &["rating_count", "review_count"]);
    match (avg, count) {
        (Some(avg), Some(count)) if count >= 0.0 => (avg.clamp(0.0, 5.0), count),
        _ => (DEFAULT_RATING, 0.0),
    }
}

fn has_synthesis(metadata: &Metadata) -> bool {
    metadata.get("review_synthesis_flag").is_some_and(|v| v.is_truthy())
}

fn has_faq(metadata: &Metadata) -> bool {
    metadata_str(metadata, "answered_faqs").is_some()
}

/// Score one candidate. A missing or non-finite distance counts as 1.0.
pub fn score_breakdown(metadata: &Metadata, distance: Option<f32>) -> ScoreBreakdown {
    let (avg, count) = rating(metadata);
    let distance = distance.filter(|d| d.is_finite()).unwrap_or(MISSING_DISTANCE).max(0.0);

    let wilson = wilson_lower_bound(((avg - 3.0) * count / 2.0).max(0.0), count);
    let bayesian = bayesian_rating(avg, count);
    let popularity = popularity(count);
    let relevance = relevance(distance);
    let content_quality = content_quality(has_synthesis(metadata), has_faq(metadata));

    let total = W_WILSON * wilson
        + W_BAYES * bayesian
        + W_POPULARITY * popularity
        + W_RELEVANCE * relevance
        + W_QUALITY * content_quality;

    ScoreBreakdown { wilson, bayesian, popularity, relevance, content_quality, total }
}

/// Ascending product id order: numeric when both parse, lexicographic otherwise.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Score and sort retriever output.
pub fn rank(result: &RetrievalResult) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = result
        .ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let metadata = result.metadatas.get(i).cloned().unwrap_or_default();
            let distance = result.distances.get(i).copied();
            let score = score_breakdown(&metadata, distance).total;
            RankedCandidate {
                product_id: id.clone(),
                document: result.documents.get(i).cloned().unwrap_or_default(),
                distance: distance.filter(|d| d.is_finite()).unwrap_or(MISSING_DISTANCE),
                metadata,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score.total_cmp(&a.score).then_with(|| compare_ids(&a.product_id, &b.product_id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MetadataValue;

    fn meta(pairs: &[(&str, MetadataValue)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn wilson_is_zero_without_ratings_and_below_raw_proportion() {
        assert_eq!(wilson_lower_bound(0.0, 0.0), 0.0);
        let lb = wilson_lower_bound(80.0, 100.0);
        assert!(lb > 0.7 && lb < 0.8, "{lb}");
    }

    #[test]
    fn bayesian_pulls_toward_prior() {
        assert!((bayesian_rating(5.0, 0.0) - 0.6).abs() < 1e-12);
        assert!((bayesian_rating(5.0, 10.0) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn content_quality_tiers() {
        assert_eq!(content_quality(false, false), 0.0);
        assert!((content_quality(true, false) - 0.3).abs() < 1e-12);
        assert!((content_quality(false, true) - 0.2).abs() < 1e-12);
        assert!((content_quality(true, true) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn unusable_ratings_fall_back_to_defaults() {
        let bad = meta(&[("rating_avg", "n/a".into()), ("rating_count", 12i64.into())]);
        let missing = Metadata::new();
        let a = score_breakdown(&bad, Some(0.2));
        let b = score_breakdown(&missing, Some(0.2));
        assert_eq!(a, b);
        assert_eq!(a.wilson, 0.0);
        assert_eq!(a.popularity, 0.0);
        assert!((a.bayesian - 0.6).abs() < 1e-12);
    }

    #[test]
    fn missing_distance_is_worst() {
        let m = Metadata::new();
        assert_eq!(score_breakdown(&m, None).relevance, 0.0);
        assert_eq!(score_breakdown(&m, Some(f32::NAN)).relevance, 0.0);
    }

    #[test]
    fn synthesis_dominates_and_ties_sort_by_numeric_id() {
        let mut result = RetrievalResult::empty();
        result.push("20".into(), Metadata::new(), String::new(), 0.1);
        result.push("3".into(), Metadata::new(), String::new(), 0.1);
        result.push(
            "100".into(),
            meta(&[("review_synthesis_flag", true.into())]),
            "Loved by picky eaters".into(),
            0.9,
        );

        let ranked = rank(&result);
        let ids: Vec<_> = ranked.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(ids, ["100", "3", "20"]);
        assert_eq!(ranked[0].document, "Loved by picky eaters");
    }
}
