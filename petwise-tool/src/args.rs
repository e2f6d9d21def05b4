//! Closed tool table and typed, schema-validated arguments.

use std::fmt;
use std::str::FromStr;

use jsonschema::Validator;
use petwise_core::{PetwiseError, Result};
use petwise_rag::ProductQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{SEARCH_ARTICLES, SEARCH_PRODUCTS, search_articles_schema, search_products_schema};

/// Every tool the model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    SearchProducts,
    SearchArticles,
}

impl ToolName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SearchProducts => SEARCH_PRODUCTS,
            Self::SearchArticles => SEARCH_ARTICLES,
        }
    }

    /// Timing label used in turn logs.
    pub fn phase_name(self) -> String {
        format!("tool:{}", self.as_str())
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = PetwiseError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            SEARCH_PRODUCTS => Ok(Self::SearchProducts),
            SEARCH_ARTICLES => Ok(Self::SearchArticles),
            other => Err(PetwiseError::UnknownTool(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArticlesArgs {
    pub query: String,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SearchProducts(ProductQuery),
    SearchArticles(SearchArticlesArgs),
}

impl ToolCall {
    pub fn name(&self) -> ToolName {
        match self {
            Self::SearchProducts(_) => ToolName::SearchProducts,
            Self::SearchArticles(_) => ToolName::SearchArticles,
        }
    }

    pub fn arguments(&self) -> Value {
        let encoded = match self {
            Self::SearchProducts(query) => serde_json::to_value(query),
            Self::SearchArticles(args) => serde_json::to_value(args),
        };
        encoded.unwrap_or(Value::Null)
    }
}

/// Compiled argument schemas, one per tool.
pub struct ArgumentValidator {
    products: Validator,
    articles: Validator,
}

impl ArgumentValidator {
    pub fn new() -> Result<Self> {
        let compile = |schema: &Value| {
            Validator::new(schema)
                .map_err(|e| PetwiseError::Config(format!("invalid tool schema: {e}")))
        };
        Ok(Self {
            products: compile(&search_products_schema())?,
            articles: compile(&search_articles_schema())?,
        })
    }

    /// Resolve the tool name and validate its raw argument JSON.
    ///
    /// An unknown name fails before the arguments are looked at.
    pub fn parse(&self, name: &str, arguments_json: &str) -> Result<ToolCall> {
        let tool: ToolName = name.parse()?;
        let invalid = |message: String| PetwiseError::InvalidArguments {
            tool: tool.to_string(),
            message,
        };

        let raw = if arguments_json.trim().is_empty() { "{}" } else { arguments_json };
        let value: Value =
            serde_json::from_str(raw).map_err(|e| invalid(format!("malformed JSON: {e}")))?;

        let validator = match tool {
            ToolName::SearchProducts => &self.products,
            ToolName::SearchArticles => &self.articles,
        };
        validator.validate(&value).map_err(|e| invalid(e.to_string()))?;

        match tool {
            ToolName::SearchProducts => serde_json::from_value(value)
                .map(ToolCall::SearchProducts)
                .map_err(|e| invalid(e.to_string())),
            ToolName::SearchArticles => serde_json::from_value(value)
                .map(ToolCall::SearchArticles)
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

/// Append `additions` to `base`, skipping blanks and case-insensitive duplicates.
pub fn merge_unique<'a>(base: &mut Vec<String>, additions: impl IntoIterator<Item = &'a String>) {
    let mut seen: Vec<String> = base.iter().map(|s| s.trim().to_lowercase()).collect();
    base.retain(|s| !s.trim().is_empty());
    seen.retain(|s| !s.is_empty());
    for item in additions {
        let trimmed = item.trim();
        let key = trimmed.to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        base.push(trimmed.to_string());
    }
}
