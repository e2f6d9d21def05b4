//! Tabular product catalog and its boolean pre-filter.
//!
//! The catalog is read once at startup from a header-first CSV or TSV file.
//! Unknown columns are ignored and numbers that fail to parse become `None`.
//! Lowercased copies of the filterable columns are kept next to each row so
//! [`Catalog::filter`] is a single linear scan with substring tests.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::error::{RagError, Result};

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(alias = "PRODUCT_ID", deserialize_with = "deserialize_id")]
    pub product_id: u64,
    #[serde(default, alias = "NAME", alias = "PRODUCT_NAME")]
    pub name: String,
    #[serde(default, alias = "BRAND", alias = "PURCHASE_BRAND")]
    pub brand: String,
    #[serde(default, alias = "PRICE", deserialize_with = "csv::invalid_option")]
    pub price: Option<f64>,
    #[serde(default, alias = "AUTOSHIP_PRICE", deserialize_with = "csv::invalid_option")]
    pub autoship_price: Option<f64>,
    #[serde(default, alias = "RATING_AVG", deserialize_with = "csv::invalid_option")]
    pub rating_avg: Option<f64>,
    #[serde(default, alias = "RATING_CNT", alias = "RATING_COUNT", deserialize_with = "csv::invalid_option")]
    pub rating_count: Option<f64>,
    #[serde(default, alias = "THUMBNAIL")]
    pub thumbnail: String,
    #[serde(default, alias = "FULLIMAGE", alias = "FULL_IMAGE")]
    pub full_image: String,
    #[serde(default, alias = "DESCRIPTION_LONG", alias = "DESCRIPTION")]
    pub description: String,
    #[serde(default, alias = "CATEGORY_LEVEL1")]
    pub category_level_1: String,
    #[serde(default, alias = "CATEGORY_LEVEL2")]
    pub category_level_2: String,
    #[serde(default, alias = "CATEGORY_LEVEL3")]
    pub category_level_3: String,
    #[serde(default, alias = "INGREDIENTS")]
    pub ingredients: String,
    #[serde(default, alias = "REVIEW_SYNTHESIS_FLAG", deserialize_with = "deserialize_flag")]
    pub review_synthesis_flag: bool,
    #[serde(default, alias = "ANSWERED_FAQS")]
    pub answered_faqs: String,
}

impl Product {
    /// The product id as carried downstream (vector ids, cards, logs).
    pub fn id(&self) -> String {
        self.product_id.to_string()
    }

    pub fn image(&self) -> Option<&str> {
        [self.thumbnail.as_str(), self.full_image.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    trimmed
        .parse::<u64>()
        .ok()
        .or_else(|| {
            trimmed.parse::<f64>().ok().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)
        })
        .ok_or_else(|| serde::de::Error::custom(format!("invalid product id '{trimmed}'")))
}

/// Flexible bool: "true"/"false", "1"/"0", "yes"/"no", empty is false.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "1.0" | "yes" | "y"))
}

#[derive(Debug, Clone)]
struct Row {
    product: Product,
    id: String,
    ingredients: String,
    category_level_1: String,
    category_level_2: String,
}

impl From<Product> for Row {
    fn from(product: Product) -> Self {
        Self {
            id: product.id(),
            ingredients: product.ingredients.to_lowercase(),
            category_level_1: product.category_level_1.to_lowercase(),
            category_level_2: product.category_level_2.to_lowercase(),
            product,
        }
    }
}

/// The immutable product catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    rows: Vec<Row>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from rows already in memory. Later duplicates of an id are dropped.
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        let mut catalog = Self::default();
        for product in products {
            let row = Row::from(product);
            if catalog.by_id.contains_key(&row.id) {
                warn!(product_id = %row.id, "duplicate product id in catalog, keeping first");
                continue;
            }
            catalog.by_id.insert(row.id.clone(), catalog.rows.len());
            catalog.rows.push(row);
        }
        catalog
    }

    /// Load a CSV or TSV file. Tab-separated when the extension is `.tsv` or
    /// the header line contains a tab.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open = || {
            File::open(path)
                .map_err(|e| RagError::CatalogError(format!("cannot open {}: {e}", path.display())))
        };

        let mut header = String::new();
        BufReader::new(open()?)
            .read_line(&mut header)
            .map_err(|e| RagError::CatalogError(format!("{}: {e}", path.display())))?;
        let is_tsv = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"))
            || header.contains('\t');

        let catalog = Self::load_reader(open()?, if is_tsv { b'\t' } else { b',' })?;
        info!(path = %path.display(), products = catalog.len(), tsv = is_tsv, "catalog loaded");
        Ok(catalog)
    }

    /// Parse delimited text with a header row.
    pub fn load_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut products = Vec::new();
        for (line_num, result) in csv_reader.deserialize::<Product>().enumerate() {
            let product = result.map_err(|e| {
                RagError::CatalogError(format!("parse error at line {}: {e}", line_num + 2))
            })?;
            products.push(product);
        }
        Ok(Self::from_products(products))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.by_id.get(product_id.trim()).map(|&i| &self.rows[i].product)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.rows.iter().map(|r| &r.product)
    }

    /// Ids of products passing every constraint, in catalog order.
    ///
    /// Starting from all rows: keep rows whose ingredients contain each
    /// required term; drop rows whose ingredients contain any excluded term
    /// (a term that is also required is not excluded here); keep rows whose
    /// level-1 and level-2 category columns contain each given token. All
    /// comparisons are case-insensitive substring tests and blank terms are
    /// ignored. No match is an empty list, not an error.
    pub fn filter(
        &self,
        required: &[String],
        excluded: &[String],
        category_level_1: &[String],
        category_level_2: &[String],
    ) -> Vec<String> {
        let required = lowercase_terms(required);
        let excluded: Vec<String> =
            lowercase_terms(excluded).into_iter().filter(|e| !required.contains(e)).collect();
        let cat1 = lowercase_terms(category_level_1);
        let cat2 = lowercase_terms(category_level_2);

        self.rows
            .iter()
            .filter(|row| required.iter().all(|r| row.ingredients.contains(r.as_str())))
            .filter(|row| !excluded.iter().any(|e| row.ingredients.contains(e.as_str())))
            .filter(|row| cat1.iter().all(|c| row.category_level_1.contains(c.as_str())))
            .filter(|row| cat2.iter().all(|c| row.category_level_2.contains(c.as_str())))
            .map(|row| row.id.clone())
            .collect()
    }
}

fn lowercase_terms(terms: &[String]) -> Vec<String> {
    terms.iter().map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()).collect()
}
