//! Retrieve → rank → analyze, packaged as product cards.

use std::sync::Arc;
use std::time::Instant;

use petwise_core::PetProfile;
use petwise_telemetry::PhaseTiming;
use serde::{Deserialize, Serialize};

use crate::analyzer::{MatchAnalyzer, QueryTerms, SearchMatch};
use crate::catalog::Product;
use crate::document::{Metadata, metadata_str};
use crate::error::Result;
use crate::ranker::{RankedCandidate, rank};
use crate::retriever::{ProductQuery, ProductRetriever};

/// A product as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCard {
    pub product_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub autoship_price: Option<f64>,
    pub rating: Option<f64>,
    pub rating_count: Option<f64>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub matches: Vec<SearchMatch>,
}

impl ProductCard {
    /// Card from the catalog row, falling back to index metadata for any gap.
    pub fn build(
        candidate: &RankedCandidate,
        product: Option<&Product>,
        matches: Vec<SearchMatch>,
    ) -> Self {
        let meta = &candidate.metadata;
        let text = |catalog: Option<&str>, key: &str| {
            catalog
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .or_else(|| metadata_str(meta, key))
                .map(str::to_string)
        };
        let number = |catalog: Option<f64>, key: &str| {
            catalog.or_else(|| meta.get(key).and_then(|v| v.as_f64()))
        };

        Self {
            product_id: candidate.product_id.clone(),
            name: text(product.map(|p| p.name.as_str()), "name")
                .unwrap_or_else(|| format!("Product {}", candidate.product_id)),
            brand: text(product.map(|p| p.brand.as_str()), "brand"),
            price: number(product.and_then(|p| p.price), "price"),
            autoship_price: number(product.and_then(|p| p.autoship_price), "autoship_price"),
            rating: number(product.and_then(|p| p.rating_avg), "rating_avg"),
            rating_count: number(product.and_then(|p| p.rating_count), "rating_count"),
            image: text(product.and_then(Product::image), "thumbnail"),
            category: text(product.map(|p| p.category_level_2.as_str()), "category_level_2"),
            score: candidate.score,
            matches,
        }
    }
}

/// Everything one product search produced.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Every surviving candidate, best first.
    pub ranked: Vec<RankedCandidate>,
    /// Cards for the top candidates, with match evidence.
    pub cards: Vec<ProductCard>,
    pub timings: Vec<PhaseTiming>,
}

impl SearchOutcome {
    /// Union of evidence field names across the cards, in first-seen order.
    pub fn matched_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for m in self.cards.iter().flat_map(|c| &c.matches) {
            if !fields.contains(&m.field_name) {
                fields.push(m.field_name.clone());
            }
        }
        fields
    }
}

/// The product half of the tool pipeline.
pub struct ProductSearch {
    retriever: Arc<ProductRetriever>,
    analyzer: MatchAnalyzer,
}

impl ProductSearch {
    pub fn new(retriever: Arc<ProductRetriever>, analyzer: MatchAnalyzer) -> Self {
        Self { retriever, analyzer }
    }

    pub fn retriever(&self) -> &Arc<ProductRetriever> {
        &self.retriever
    }

    pub async fn search(&self, query: &ProductQuery, pet: Option<&PetProfile>) -> Result<SearchOutcome> {
        let mut timings = Vec::with_capacity(3);

        let started = Instant::now();
        let retrieved = self.retriever.retrieve(query).await?;
        timings.push(PhaseTiming::new("retrieve", started.elapsed()));

        let started = Instant::now();
        let ranked = rank(&retrieved);
        timings.push(PhaseTiming::new("rank", started.elapsed()));

        let started = Instant::now();
        let terms = QueryTerms::new(&query.query, pet, &query.excluded_ingredients);
        let evidence = self.analyzer.analyze(&terms, &ranked);
        let catalog = self.retriever.catalog();
        let cards = ranked
            .iter()
            .zip(evidence)
            .map(|(candidate, found)| {
                ProductCard::build(candidate, catalog.get(&candidate.product_id), found.matches)
            })
            .collect();
        timings.push(PhaseTiming::new("analyze", started.elapsed()));

        Ok(SearchOutcome { ranked, cards, timings })
    }
}

/// Metadata-only card, for products that never went through a search.
pub fn card_from_metadata(product_id: &str, metadata: &Metadata) -> ProductCard {
    let candidate = RankedCandidate {
        product_id: product_id.to_string(),
        metadata: metadata.clone(),
        document: String::new(),
        distance: 1.0,
        score: 0.0,
    };
    ProductCard::build(&candidate, None, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MetadataValue;

    #[test]
    fn card_prefers_catalog_and_falls_back_to_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("name".into(), MetadataValue::from("Index Name"));
        metadata.insert("brand".into(), MetadataValue::from("Index Brand"));
        metadata.insert("price".into(), MetadataValue::Float(12.5));
        let candidate = RankedCandidate {
            product_id: "7".into(),
            metadata: metadata.clone(),
            document: String::new(),
            distance: 0.2,
            score: 0.4,
        };
        let product = Product {
            product_id: 7,
            name: "Catalog Name".into(),
            brand: String::new(),
            price: None,
            autoship_price: Some(10.0),
            rating_avg: Some(4.5),
            rating_count: Some(20.0),
            thumbnail: "https://img/7.jpg".into(),
            full_image: String::new(),
            description: String::new(),
            category_level_1: "Dog".into(),
            category_level_2: "Food".into(),
            category_level_3: String::new(),
            ingredients: String::new(),
            review_synthesis_flag: true,
            answered_faqs: String::new(),
        };

        let card = ProductCard::build(&candidate, Some(&product), Vec::new());
        assert_eq!(card.name, "Catalog Name");
        assert_eq!(card.brand.as_deref(), Some("Index Brand"));
        assert_eq!(card.price, Some(12.5));
        assert_eq!(card.image.as_deref(), Some("https://img/7.jpg"));

        let bare = card_from_metadata("8", &Metadata::new());
        assert_eq!(bare.name, "Product 8");
    }
}
