//! Per-product match evidence.
//!
//! The analyzer explains *why* a product fits: it matches query and pet
//! profile terms against a dynamically chosen set of metadata fields and emits
//! [`SearchMatch`] tuples the UI can show next to each card. Only exact phrase
//! matches (confidence 1.0) are emitted; every excluded ingredient is echoed
//! as an `"Excluded Ingredients"` match so allergy handling is visible.

use petwise_core::PetProfile;
use serde::{Deserialize, Serialize};

use crate::document::{
    INGREDIENT_TAG_PREFIX, Metadata, SPECIAL_DIET_TAG_PREFIX, metadata_str, tag_values,
};
use crate::ranker::RankedCandidate;
use crate::text;

/// Field name used for excluded-ingredient evidence.
pub const EXCLUDED_FIELD: &str = "Excluded Ingredients";

/// Minimum length overlap for the containment tier.
const CONTAINMENT_THRESHOLD: f64 = 0.7;
const MAX_NGRAM: usize = 3;
const ALLERGY_TERMS: [&str; 3] = ["allergy", "hypoallergenic", "sensitive"];

/// One piece of match evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub field_name: String,
    pub field_value: String,
    /// Query or pet tokens that formed the matching phrase.
    pub matched_terms: Vec<String>,
    pub confidence: f64,
}

/// Evidence for one ranked product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMatches {
    pub product_id: String,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Key(&'static str),
    Tags(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    source: Source,
    always: bool,
    preserve_phrase: bool,
}

const fn field(name: &'static str, source: Source, always: bool, preserve: bool) -> FieldSpec {
    FieldSpec { name, source, always, preserve_phrase: preserve }
}

const FIELDS: &[FieldSpec] = &[
    field("Product Name", Source::Key("name"), true, false),
    field("Category", Source::Key("category_level_1"), true, false),
    field("Subcategory", Source::Key("category_level_2"), true, false),
    field("Product Type", Source::Key("category_level_3"), true, false),
    field("Pet Type", Source::Key("pet_type"), true, false),
    field("Life Stage", Source::Key("life_stage"), true, false),
    field("Breed Size", Source::Key("breed_size"), true, false),
    field("Brand", Source::Key("brand"), false, true),
    field("Food Form", Source::Key("food_form"), false, false),
    field("Special Diet", Source::Tags(SPECIAL_DIET_TAG_PREFIX), false, true),
    field("Ingredients", Source::Tags(INGREDIENT_TAG_PREFIX), false, false),
    field("Customer Highlights", Source::Key("what_customers_love"), false, true),
];

/// Query, pet, and exclusion terms for one search.
#[derive(Debug, Clone, Default)]
pub struct QueryTerms {
    /// Token sequences phrases are built from; n-grams never cross sequences.
    sequences: Vec<Vec<String>>,
    tokens: Vec<String>,
    excluded: Vec<(String, Vec<String>)>,
}

impl QueryTerms {
    pub fn new(query: &str, pet: Option<&PetProfile>, excluded_ingredients: &[String]) -> Self {
        let mut sequences = vec![text::tokenize(query)];

        if let Some(pet) = pet {
            let attributes = [
                pet.species.clone(),
                pet.breed.clone(),
                pet.life_stage.clone(),
                pet.effective_size(),
            ];
            sequences.extend(attributes.iter().flatten().map(|v| text::tokenize(v)));
            sequences.extend(pet.allergies.iter().map(|a| text::tokenize(a)));
            if pet.allergies.iter().any(|a| !a.trim().is_empty()) {
                sequences.extend(ALLERGY_TERMS.iter().map(|t| vec![(*t).to_string()]));
            }
        }

        let excluded: Vec<(String, Vec<String>)> = excluded_ingredients
            .iter()
            .map(|e| (e.trim().to_string(), text::tokenize(e)))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();
        sequences.extend(excluded.iter().map(|(_, tokens)| tokens.clone()));
        sequences.retain(|s| !s.is_empty());

        let tokens = text::dedupe(sequences.iter().flatten().cloned().collect());
        Self { sequences, tokens, excluded }
    }

    /// All query, pet and exclusion tokens, deduplicated in first-seen order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Contiguous phrases of up to three tokens with their component tokens.
    fn phrases(&self) -> Vec<(String, &[String])> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for sequence in &self.sequences {
            for n in 1..=MAX_NGRAM.min(sequence.len()) {
                for window in sequence.windows(n) {
                    let phrase = window.join(" ");
                    if seen.insert(phrase.clone()) {
                        out.push((phrase, window));
                    }
                }
            }
        }
        out
    }
}

/// Two-tier phrase similarity: 1.0 on equality, the length ratio when one
/// contains the other with at least 70 % overlap, otherwise 0.
pub fn phrase_confidence(query_phrase: &str, field_token: &str) -> f64 {
    if query_phrase.is_empty() || field_token.is_empty() {
        return 0.0;
    }
    if query_phrase == field_token {
        return 1.0;
    }
    if query_phrase.contains(field_token) || field_token.contains(query_phrase) {
        let (a, b) = (query_phrase.chars().count(), field_token.chars().count());
        let ratio = a.min(b) as f64 / a.max(b) as f64;
        if ratio >= CONTAINMENT_THRESHOLD {
            return ratio;
        }
    }
    0.0
}

fn field_values(metadata: &Metadata, source: Source) -> Vec<String> {
    match source {
        Source::Key(key) => metadata_str(metadata, key).map(str::to_string).into_iter().collect(),
        Source::Tags(prefix) => tag_values(metadata, prefix)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn mentions_any(values: &[String], tokens: &[String]) -> bool {
    values.iter().any(|value| {
        let plain = text::normalize(value);
        let lemmas = text::phrase(value);
        tokens.iter().any(|t| plain.contains(t.as_str()) || lemmas.contains(t.as_str()))
    })
}

/// Evidence for one product's metadata.
pub fn analyze_product(terms: &QueryTerms, metadata: &Metadata) -> Vec<SearchMatch> {
    let phrases = terms.phrases();
    let mut matches = Vec::new();

    for spec in FIELDS {
        let values = field_values(metadata, spec.source);
        if values.is_empty() || (!spec.always && !mentions_any(&values, terms.tokens())) {
            continue;
        }

        let field_tokens: Vec<String> =
            values.iter().flat_map(|v| text::field_tokens(v, spec.preserve_phrase)).collect();
        let mut matched: Vec<String> = Vec::new();
        for (phrase, parts) in &phrases {
            let exact = field_tokens.iter().any(|ft| phrase_confidence(phrase, ft) >= 1.0);
            if exact {
                matched.extend(parts.iter().cloned());
            }
        }
        if matched.is_empty() {
            continue;
        }

        matches.push(SearchMatch {
            field_name: spec.name.to_string(),
            field_value: values.join(", "),
            matched_terms: text::dedupe(matched),
            confidence: 1.0,
        });
    }

    for (ingredient, tokens) in &terms.excluded {
        matches.push(SearchMatch {
            field_name: EXCLUDED_FIELD.to_string(),
            field_value: ingredient.clone(),
            matched_terms: tokens.clone(),
            confidence: 1.0,
        });
    }

    matches
}

/// Applies [`analyze_product`] to the top-ranked candidates.
#[derive(Debug, Clone, Copy)]
pub struct MatchAnalyzer {
    top_m: usize,
}

impl Default for MatchAnalyzer {
    fn default() -> Self {
        Self::new(30)
    }
}

impl MatchAnalyzer {
    pub fn new(top_m: usize) -> Self {
        Self { top_m }
    }

    pub fn analyze(&self, terms: &QueryTerms, ranked: &[RankedCandidate]) -> Vec<ProductMatches> {
        ranked
            .iter()
            .take(self.top_m)
            .map(|c| ProductMatches {
                product_id: c.product_id.clone(),
                matches: analyze_product(terms, &c.metadata),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MetadataValue;

    fn metadata(pairs: &[(&str, &str)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), MetadataValue::from(*v))).collect()
    }

    fn find<'a>(matches: &'a [SearchMatch], field: &str) -> Option<&'a SearchMatch> {
        matches.iter().find(|m| m.field_name == field)
    }

    #[test]
    fn confidence_tiers() {
        assert_eq!(phrase_confidence("puppy", "puppy"), 1.0);
        assert!((phrase_confidence("grain-free", "grain-fre") - 0.9).abs() < 1e-9);
        assert_eq!(phrase_confidence("purina", "purina pro plan"), 0.0);
    }

    #[test]
    fn pet_size_matches_breed_size_field() {
        let mut pet = PetProfile::new("Max");
        pet.species = Some("Dog".into());
        pet.size = Some("Large".into());
        let terms = QueryTerms::new("i need a dog bed for my big dog", Some(&pet), &[]);
        let meta = metadata(&[
            ("name", "Orthopedic Dog Bed"),
            ("category_level_2", "Beds, Crates & Gear"),
            ("breed_size", "Large Breed"),
        ]);

        let matches = analyze_product(&terms, &meta);
        let size = find(&matches, "Breed Size").expect("breed size evidence");
        assert_eq!(size.matched_terms, ["large"]);
        let name = find(&matches, "Product Name").unwrap();
        assert!(name.matched_terms.contains(&"bed".to_string()));
        assert!(matches.iter().all(|m| m.confidence == 1.0));
    }

    #[test]
    fn brand_needs_the_whole_phrase() {
        let meta = metadata(&[("name", "Adult Kibble"), ("brand", "Purina Pro Plan")]);

        let partial = analyze_product(&QueryTerms::new("purina food", None, &[]), &meta);
        assert!(find(&partial, "Brand").is_none());

        let whole = analyze_product(&QueryTerms::new("purina pro plan kibble", None, &[]), &meta);
        assert_eq!(find(&whole, "Brand").unwrap().matched_terms, ["purina", "pro", "plan"]);
    }

    #[test]
    fn allergies_expand_terms_and_exclusions_are_echoed() {
        let mut pet = PetProfile::new("Luna");
        pet.allergies = vec!["Chicken".into()];
        let terms = QueryTerms::new("cat food", Some(&pet), &["chicken".into(), " ".into()]);
        assert!(terms.tokens().contains(&"hypoallergenic".to_string()));

        let mut meta = metadata(&[("name", "Salmon Pate")]);
        meta.insert("specialdiettag:Sensitive Digestion".into(), true.into());
        let matches = analyze_product(&terms, &meta);

        let excluded: Vec<_> = matches.iter().filter(|m| m.field_name == EXCLUDED_FIELD).collect();
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].matched_terms, ["chicken"]);
        // "sensitive" makes the diet field relevant, but the phrase differs.
        assert!(find(&matches, "Special Diet").is_none());
    }

    #[test]
    fn analyzer_limits_to_top_m() {
        let candidates: Vec<RankedCandidate> = (0..5)
            .map(|i| RankedCandidate {
                product_id: i.to_string(),
                metadata: metadata(&[("name", "Dog Toy")]),
                document: String::new(),
                distance: 0.5,
                score: 1.0,
            })
            .collect();
        let terms = QueryTerms::new("dog toy", None, &[]);
        let out = MatchAnalyzer::new(3).analyze(&terms, &candidates);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].matches[0].matched_terms, ["dog", "toy"]);
    }
}
