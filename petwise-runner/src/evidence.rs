//! Formats ranked products for the compose call.

use petwise_rag::articles::truncate;
use petwise_rag::document::metadata_str;
use petwise_rag::{RankedCandidate, SearchOutcome};

use crate::prompts::EVIDENCE_PREAMBLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidenceLimits {
    /// Products shown when review content exists.
    pub with_content: usize,
    /// Products shown when none has review content.
    pub fallback: usize,
    pub faq_chars: usize,
}

impl Default for EvidenceLimits {
    fn default() -> Self {
        Self { with_content: 10, fallback: 5, faq_chars: 400 }
    }
}

fn has_review_content(candidate: &RankedCandidate) -> bool {
    ["what_customers_love", "what_to_watch_out_for", "should_you_buy_it", "answered_faqs"]
        .iter()
        .any(|key| metadata_str(&candidate.metadata, key).is_some())
}

/// The evidence instruction for a product search, or `None` for no results.
pub fn format_evidence(outcome: &SearchOutcome, limits: EvidenceLimits) -> Option<String> {
    if outcome.ranked.is_empty() {
        return None;
    }

    let with_content: Vec<(usize, &RankedCandidate)> = outcome
        .ranked
        .iter()
        .enumerate()
        .filter(|(_, c)| has_review_content(c))
        .take(limits.with_content)
        .collect();
    let chosen = if with_content.is_empty() {
        outcome.ranked.iter().enumerate().take(limits.fallback).collect()
    } else {
        with_content
    };

    let mut out = String::from(EVIDENCE_PREAMBLE);
    let fields = outcome.matched_fields();
    if !fields.is_empty() {
        out.push_str(&format!("\nCategory matches found: {}", fields.join(", ")));
    }

    for (index, candidate) in chosen {
        let title = outcome
            .cards
            .iter()
            .find(|card| card.product_id == candidate.product_id)
            .map(|card| card.name.clone())
            .or_else(|| metadata_str(&candidate.metadata, "name").map(str::to_string))
            .unwrap_or_else(|| format!("Product {}", candidate.product_id));

        out.push_str(&format!("\n\nProduct {}: {title}", index + 1));
        let meta = &candidate.metadata;
        if let Some(love) = metadata_str(meta, "what_customers_love") {
            out.push_str(&format!("\nWhat customers love: {love}"));
        }
        if let Some(watch) = metadata_str(meta, "what_to_watch_out_for") {
            out.push_str(&format!("\nWhat to watch out for: {watch}"));
        }
        if let Some(faqs) = metadata_str(meta, "answered_faqs") {
            out.push_str(&format!("\nAnswered FAQs: {}", truncate(faqs, limits.faq_chars)));
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use petwise_rag::{Metadata, MetadataValue};

    fn candidate(id: &str, love: Option<&str>) -> RankedCandidate {
        let mut metadata = Metadata::new();
        metadata.insert("name".into(), MetadataValue::from(format!("Item {id}")));
        if let Some(love) = love {
            metadata.insert("what_customers_love".into(), MetadataValue::from(love));
        }
        RankedCandidate { product_id: id.into(), metadata, document: String::new(), distance: 0.1, score: 0.5 }
    }

    #[test]
    fn prefers_products_with_review_content() {
        let outcome = SearchOutcome {
            ranked: vec![candidate("1", None), candidate("2", Some("Dogs devour it."))],
            ..Default::default()
        };
        let text = format_evidence(&outcome, EvidenceLimits::default()).unwrap();
        assert!(text.contains("Product 2: Item 2\nWhat customers love: Dogs devour it."));
        assert!(!text.contains("Item 1"));
    }

    #[test]
    fn falls_back_to_top_products() {
        let ranked = (1..=7).map(|i| candidate(&i.to_string(), None)).collect();
        let outcome = SearchOutcome { ranked, ..Default::default() };
        let text = format_evidence(&outcome, EvidenceLimits::default()).unwrap();
        assert!(text.contains("Product 5: Item 5"));
        assert!(!text.contains("Product 6"));
        assert!(format_evidence(&SearchOutcome::default(), EvidenceLimits::default()).is_none());
    }
}
