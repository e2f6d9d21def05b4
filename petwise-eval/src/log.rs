//! The per-turn evaluation record.
//!
//! A log is built by one turn and published once. Nothing in it is shared
//! with other turns; the builder is owned by the turn that creates it.

use chrono::{DateTime, Utc};
use petwise_telemetry::PhaseTiming;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One tool invocation as the turn executed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Value,
    pub result_count: usize,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A ranked product as it was presented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub rank: usize,
    pub product_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub matched_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationLog {
    pub turn_id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub query: String,
    #[serde(default)]
    pub has_image: bool,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub products: Vec<ProductSummary>,
    /// Named phases in the order they ran.
    #[serde(default)]
    pub timings: Vec<PhaseTiming>,
    pub final_reply: String,
    #[serde(default)]
    pub buttons: Vec<String>,
    /// The reply stream ended before the model finished.
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Accumulates one turn's log.
#[derive(Debug, Clone)]
pub struct EvaluationLogBuilder {
    log: EvaluationLog,
}

impl EvaluationLogBuilder {
    pub fn new(user_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            log: EvaluationLog {
                turn_id: Uuid::new_v4(),
                user_id: user_id.into(),
                timestamp: Utc::now(),
                query: query.into(),
                has_image: false,
                tool_calls: Vec::new(),
                products: Vec::new(),
                timings: Vec::new(),
                final_reply: String::new(),
                buttons: Vec::new(),
                partial: false,
                errors: Vec::new(),
            },
        }
    }

    pub fn turn_id(&self) -> Uuid {
        self.log.turn_id
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.log.timestamp = timestamp;
        self
    }

    pub fn with_image(mut self, has_image: bool) -> Self {
        self.log.has_image = has_image;
        self
    }

    pub fn tool_call(&mut self, record: ToolCallRecord) {
        self.log.tool_calls.push(record);
    }

    pub fn products(&mut self, products: Vec<ProductSummary>) {
        self.log.products = products;
    }

    pub fn timings(&mut self, timings: impl IntoIterator<Item = PhaseTiming>) {
        self.log.timings.extend(timings);
    }

    pub fn error(&mut self, error: impl Into<String>) {
        self.log.errors.push(error.into());
    }

    pub fn finish(mut self, final_reply: String, buttons: Vec<String>, partial: bool) -> EvaluationLog {
        self.log.final_reply = final_reply;
        self.log.buttons = buttons;
        self.log.partial = partial;
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_keeps_phase_order_and_round_trips() {
        let mut builder = EvaluationLogBuilder::new("u1", "puppy food").with_image(true);
        builder.tool_call(ToolCallRecord {
            name: "search_products".into(),
            arguments: json!({"query": "puppy food"}),
            result_count: 2,
            timed_out: false,
            error: None,
        });
        builder.timings([
            PhaseTiming::new("route_llm", std::time::Duration::from_millis(5)),
            PhaseTiming::new("tool:search_products", std::time::Duration::from_millis(9)),
        ]);
        builder.error("vector store retry");
        let log = builder.finish("Here you go".into(), vec!["Show treats".into()], true);

        let names: Vec<&str> = log.timings.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["route_llm", "tool:search_products"]);

        let json = serde_json::to_string(&log).unwrap();
        let back: EvaluationLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.turn_id, log.turn_id);
        assert_eq!(back.tool_calls, log.tool_calls);
        assert_eq!(back.timings.len(), 2);
        assert!(back.partial && back.has_image);
    }
}
