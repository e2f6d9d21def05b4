//! Records consumed from the user/pet/interaction store.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Content;

/// A pet belonging to a customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PetProfile {
    pub name: String,
    pub species: Option<String>,
    pub breed: Option<String>,
    /// Free-text size label such as `Small`, `Medium` or `Large`.
    pub size: Option<String>,
    pub weight_lbs: Option<f32>,
    pub life_stage: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    pub birthday: Option<NaiveDate>,
    /// When the pet was added to the customer's profile.
    pub added_at: Option<DateTime<Utc>>,
}

impl PetProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// The explicit size label, or one derived from weight.
    pub fn effective_size(&self) -> Option<String> {
        if let Some(size) = self.size.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(size.trim().to_string());
        }
        self.weight_lbs.map(|weight| {
            if weight < 25.0 {
                "Small".to_string()
            } else if weight < 60.0 {
                "Medium".to_string()
            } else {
                "Large".to_string()
            }
        })
    }
}

/// Customer preferences injected into the system prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub display_name: Option<String>,
    pub persona_summary: Option<String>,
    #[serde(default)]
    pub preferred_brands: Vec<String>,
    #[serde(default)]
    pub dietary_preferences: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub possible_next_buys: Vec<String>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "purchase")]
    Purchase,
    #[serde(rename = "addToCart")]
    AddToCart,
    #[serde(rename = "productClick")]
    ProductClick,
}

/// A logged customer interaction with a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub customer: String,
    pub event_type: EventType,
    pub item_id: String,
    /// Monetary value for purchases and add-to-cart events, zero otherwise.
    pub event_value: f64,
    /// Snapshot of product fields (`name`, `brand`, `category_level_1`, ...).
    #[serde(default)]
    pub product_metadata: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl InteractionEvent {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.product_metadata.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A prior turn of the conversation supplied by the web layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, text: text.into() }
    }

    pub fn to_content(&self) -> Content {
        match self.role {
            ChatRole::User => Content::user(self.text.clone()),
            ChatRole::Assistant => Content::assistant(self.text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_falls_back_to_weight() {
        let mut pet = PetProfile::new("Rex");
        assert_eq!(pet.effective_size(), None);
        pet.weight_lbs = Some(72.0);
        assert_eq!(pet.effective_size().as_deref(), Some("Large"));
        pet.size = Some(" Small ".into());
        assert_eq!(pet.effective_size().as_deref(), Some("Small"));
    }

    #[test]
    fn event_type_uses_camel_case_wire_names() {
        let json = serde_json::to_string(&EventType::AddToCart).unwrap();
        assert_eq!(json, "\"addToCart\"");
        let parsed: EventType = serde_json::from_str("\"productClick\"").unwrap();
        assert_eq!(parsed, EventType::ProductClick);
    }
}
