//! Ordered phase timings for a single turn.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// One named phase and how long it took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub name: String,
    pub millis: f64,
}

impl PhaseTiming {
    pub fn new(name: impl Into<String>, elapsed: Duration) -> Self {
        Self { name: name.into(), millis: elapsed.as_secs_f64() * 1000.0 }
    }
}

/// Collects phase durations in the order they were recorded.
///
/// ```rust,ignore
/// let mut timer = PhaseTimer::new();
/// let response = timer.time("route_llm", llm.generate(request)).await;
/// timer.record("tool:search_products", started.elapsed());
/// ```
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    started: Instant,
    phases: Vec<PhaseTiming>,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self { started: Instant::now(), phases: Vec::new() }
    }

    pub fn record(&mut self, name: impl Into<String>, elapsed: Duration) {
        self.phases.push(PhaseTiming::new(name, elapsed));
    }

    /// Await `fut` and record its wall-clock duration under `name`.
    pub async fn time<F: Future>(&mut self, name: impl Into<String>, fut: F) -> F::Output {
        let start = Instant::now();
        let output = fut.await;
        self.record(name, start.elapsed());
        output
    }

    /// Append timings measured elsewhere, prefixing each name.
    pub fn extend_prefixed(&mut self, prefix: &str, timings: impl IntoIterator<Item = PhaseTiming>) {
        self.phases.extend(timings.into_iter().map(|t| PhaseTiming {
            name: format!("{prefix}{}", t.name),
            millis: t.millis,
        }));
    }

    /// Time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn phases(&self) -> &[PhaseTiming] {
        &self.phases
    }

    pub fn into_phases(self) -> Vec<PhaseTiming> {
        self.phases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_recording_order() {
        let mut timer = PhaseTimer::new();
        let value = timer.time("route_llm", async { 7 }).await;
        timer.record("compose_total", Duration::from_millis(12));
        timer.extend_prefixed("tool:", vec![PhaseTiming::new("retrieve", Duration::from_millis(3))]);

        assert_eq!(value, 7);
        let names: Vec<_> = timer.phases().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["route_llm", "compose_total", "tool:retrieve"]);
        assert!((timer.phases()[1].millis - 12.0).abs() < 1e-9);
    }
}
