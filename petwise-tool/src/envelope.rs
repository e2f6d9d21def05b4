//! The uniform result of one tool call.

use petwise_rag::{ArticleHit, ProductCard, SearchOutcome};
use petwise_telemetry::PhaseTiming;
use serde_json::Value;

use crate::args::ToolName;

#[derive(Debug, Clone)]
pub enum ToolPayload {
    Products(SearchOutcome),
    Articles(Vec<ArticleHit>),
}

impl ToolPayload {
    pub fn empty(kind: ToolName) -> Self {
        match kind {
            ToolName::SearchProducts => Self::Products(SearchOutcome::default()),
            ToolName::SearchArticles => Self::Articles(Vec::new()),
        }
    }
}

/// `{kind, payload, timings}` plus the effective arguments and deadline status.
#[derive(Debug, Clone)]
pub struct ToolEnvelope {
    pub kind: ToolName,
    /// Arguments after allergy merging, as actually executed.
    pub arguments: Value,
    pub payload: ToolPayload,
    pub timings: Vec<PhaseTiming>,
    pub timed_out: bool,
}

impl ToolEnvelope {
    pub fn products(&self) -> &[ProductCard] {
        match &self.payload {
            ToolPayload::Products(outcome) => &outcome.cards,
            ToolPayload::Articles(_) => &[],
        }
    }

    pub fn articles(&self) -> &[ArticleHit] {
        match &self.payload {
            ToolPayload::Articles(hits) => hits,
            ToolPayload::Products(_) => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.payload {
            ToolPayload::Products(outcome) => outcome.ranked.is_empty(),
            ToolPayload::Articles(hits) => hits.is_empty(),
        }
    }

    /// The short output fed back to the model for this call.
    pub fn model_output(&self) -> String {
        match &self.payload {
            ToolPayload::Products(outcome) => format!("{} products returned", outcome.ranked.len()),
            ToolPayload::Articles(hits) if hits.is_empty() => "No articles found.".to_string(),
            ToolPayload::Articles(hits) => hits
                .iter()
                .enumerate()
                .map(|(i, hit)| format!("{}. [{}]({})\n   {}", i + 1, hit.title, hit.url, hit.summary))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn article_output_uses_markdown_links() {
        let envelope = ToolEnvelope {
            kind: ToolName::SearchArticles,
            arguments: json!({"query": "puppy tips"}),
            payload: ToolPayload::Articles(vec![ArticleHit {
                title: "Bringing Home a Puppy".into(),
                url: "https://example.com/puppy".into(),
                summary: "First week checklist.".into(),
            }]),
            timings: Vec::new(),
            timed_out: false,
        };
        assert!(envelope.model_output().contains("[Bringing Home a Puppy](https://example.com/puppy)"));
        assert!(envelope.products().is_empty());
    }

    #[test]
    fn empty_products_report_zero() {
        let envelope = ToolEnvelope {
            kind: ToolName::SearchProducts,
            arguments: Value::Null,
            payload: ToolPayload::empty(ToolName::SearchProducts),
            timings: Vec::new(),
            timed_out: true,
        };
        assert!(envelope.is_empty());
        assert_eq!(envelope.model_output(), "0 products returned");
    }
}
