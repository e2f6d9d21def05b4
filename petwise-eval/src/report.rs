//! Daily quantitative report over evaluation logs.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::log::EvaluationLog;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    pub name: String,
    pub count: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeReport {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub turns: usize,
    pub tool_usage: BTreeMap<String, usize>,
    /// Phases in first-seen order.
    pub phases: Vec<PhaseStats>,
    pub turns_with_errors: usize,
    pub partial_turns: usize,
    pub mean_products_per_turn: f64,
}

impl QuantitativeReport {
    pub fn from_logs(date: NaiveDate, logs: &[EvaluationLog]) -> Self {
        let mut tool_usage = BTreeMap::new();
        let mut samples: Vec<(String, Vec<f64>)> = Vec::new();

        for log in logs {
            for call in &log.tool_calls {
                *tool_usage.entry(call.name.clone()).or_insert(0) += 1;
            }
            for timing in &log.timings {
                match samples.iter_mut().find(|(name, _)| *name == timing.name) {
                    Some((_, values)) => values.push(timing.millis),
                    None => samples.push((timing.name.clone(), vec![timing.millis])),
                }
            }
        }

        let phases = samples
            .into_iter()
            .map(|(name, mut values)| {
                values.sort_by(f64::total_cmp);
                PhaseStats {
                    count: values.len(),
                    mean_ms: values.iter().sum::<f64>() / values.len() as f64,
                    p50_ms: percentile(&values, 0.50),
                    p95_ms: percentile(&values, 0.95),
                    name,
                }
            })
            .collect();

        let turns = logs.len();
        let products: usize = logs.iter().map(|l| l.products.len()).sum();
        Self {
            date,
            generated_at: Utc::now(),
            turns,
            tool_usage,
            phases,
            turns_with_errors: logs.iter().filter(|l| !l.errors.is_empty()).count(),
            partial_turns: logs.iter().filter(|l| l.partial).count(),
            mean_products_per_turn: if turns == 0 { 0.0 } else { products as f64 / turns as f64 },
        }
    }
}

/// Nearest-rank percentile of sorted values.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
