//! Single-call product comparison and product questions.

use std::sync::Arc;

use petwise_core::{ChatTurn, Content, Llm, LlmRequest};
use petwise_rag::document::metadata_str;
use petwise_rag::{Catalog, PRODUCT_COLLECTION, ProductCard, VectorGateway};
use tracing::{info, warn};

use crate::prompts::SENTINEL_REPLY;

pub const HIGH_DEMAND_REPLY: &str =
    "We're experiencing high demand right now. Please try again in a moment.";

/// Domains that must never appear in an answer.
pub const COMPETITOR_DOMAINS: &[&str] = &[
    "amazon.com",
    "walmart.com",
    "petco.com",
    "petsmart.com",
    "target.com",
    "costco.com",
    "tractorsupply.com",
    "1800petmeds.com",
    "petsupplies.com",
];

const QA_INSTRUCTIONS: &str = "You are Petwise, a shopping assistant for an online pet supply store. \
Answer using only the product information provided. If the information does not answer the question, say so. \
Be concise, balanced and specific. Never mention or link to other retailers.";

/// Drop every line that references a competitor.
pub fn scrub_competitors(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            !COMPETITOR_DOMAINS.iter().any(|domain| lower.contains(domain))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub struct ProductQa {
    llm: Arc<dyn Llm>,
    gateway: Arc<VectorGateway>,
    catalog: Arc<Catalog>,
    model: String,
    collection: String,
}

impl ProductQa {
    pub fn new(
        llm: Arc<dyn Llm>,
        gateway: Arc<VectorGateway>,
        catalog: Arc<Catalog>,
        model: impl Into<String>,
    ) -> Self {
        Self { llm, gateway, catalog, model: model.into(), collection: PRODUCT_COLLECTION.to_string() }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub async fn compare_products(&self, question: &str, products: &[ProductCard], history: &[ChatTurn]) -> String {
        let mut blocks = Vec::with_capacity(products.len());
        for (i, product) in products.iter().enumerate() {
            blocks.push(format!("Product {}:\n{}", i + 1, self.product_block(product).await));
        }
        let prompt = format!(
            "Compare these products for the customer.\n\n{}\n\nCustomer question: {question}",
            blocks.join("\n\n")
        );
        self.answer(prompt, history, "compare_products").await
    }

    pub async fn ask_about_product(&self, question: &str, product: &ProductCard, history: &[ChatTurn]) -> String {
        let prompt = format!(
            "Product information:\n{}\n\nCustomer question: {question}",
            self.product_block(product).await
        );
        self.answer(prompt, history, "ask_about_product").await
    }

    async fn answer(&self, prompt: String, history: &[ChatTurn], operation: &str) -> String {
        let mut contents = vec![Content::system(QA_INSTRUCTIONS)];
        contents.extend(history.iter().map(ChatTurn::to_content));
        contents.push(Content::user(prompt));
        let request = LlmRequest::new(self.model.clone(), contents).with_temperature(0.2);

        match self.llm.generate(request).await {
            Ok(response) => {
                let text = scrub_competitors(&response.text().unwrap_or_default());
                info!(operation, chars = text.len(), "product answer generated");
                if text.is_empty() { SENTINEL_REPLY.to_string() } else { text }
            }
            Err(e) if e.is_rate_limited() => {
                warn!(operation, error = %e, "rate limited");
                HIGH_DEMAND_REPLY.to_string()
            }
            Err(e) => {
                warn!(operation, error = %e, "product answer failed");
                SENTINEL_REPLY.to_string()
            }
        }
    }

    async fn product_block(&self, card: &ProductCard) -> String {
        let mut lines = vec![format!("Title: {}", card.name)];
        if let Some(brand) = &card.brand {
            lines.push(format!("Brand: {brand}"));
        }
        if let Some(price) = card.price {
            lines.push(format!("Price: ${price:.2}"));
        }
        if let Some(autoship) = card.autoship_price {
            lines.push(format!("Autoship price: ${autoship:.2}"));
        }
        if let (Some(rating), Some(count)) = (card.rating, card.rating_count) {
            lines.push(format!("Rating: {rating:.1} from {count} reviews"));
        }

        if let Some(product) = self.catalog.get(&card.product_id) {
            if !product.description.trim().is_empty() {
                lines.push(format!("Description: {}", product.description.trim()));
            }
            if !product.ingredients.trim().is_empty() {
                lines.push(format!("Ingredients: {}", product.ingredients.trim()));
            }
        }

        // Review synthesis is stored as `<id>` or `<id>_<chunk>`.
        let prefix = &card.product_id;
        match self.gateway.get_by_id_prefix(&self.collection, prefix).await {
            Ok(result) => {
                let chunk_prefix = format!("{prefix}_");
                for (i, id) in result.ids.iter().enumerate() {
                    if id != prefix && !id.starts_with(&chunk_prefix) {
                        continue;
                    }
                    let meta = &result.metadatas[i];
                    for (key, label) in [
                        ("what_customers_love", "What customers love"),
                        ("what_to_watch_out_for", "What to watch out for"),
                        ("should_you_buy_it", "Should you buy it"),
                        ("answered_faqs", "Answered FAQs"),
                    ] {
                        if let Some(value) = metadata_str(meta, key) {
                            lines.push(format!("{label}: {value}"));
                        }
                    }
                    if !result.documents[i].trim().is_empty() {
                        lines.push(format!("Review synthesis: {}", result.documents[i].trim()));
                    }
                }
            }
            Err(e) => warn!(product_id = %card.product_id, error = %e, "review synthesis lookup failed"),
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_removes_competitor_lines_only() {
        let text = "Both are great.\nCheaper on Amazon.com right now.\nThe salmon one is grain-free.";
        assert_eq!(scrub_competitors(text), "Both are great.\nThe salmon one is grain-free.");
    }
}
