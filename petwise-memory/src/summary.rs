//! Aggregates a customer's interaction history for the persona prompt.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use petwise_core::{EventType, InteractionEvent};
use serde::{Deserialize, Serialize};

const UNCATEGORIZED: &str = "Uncategorized";
const UNKNOWN_BRAND: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendLine {
    pub label: String,
    pub spend: f64,
    pub purchases: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub item_id: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Structured purchase history handed to the persona model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionSummary {
    pub total_purchases: usize,
    pub total_spend: f64,
    pub add_to_cart_count: usize,
    pub product_click_count: usize,
    /// Spend per category, highest first.
    pub category_spend: Vec<SpendLine>,
    /// Brands by spend, highest first.
    pub top_brands: Vec<SpendLine>,
    /// Most recent purchases, newest first.
    pub recent_purchases: Vec<PurchaseLine>,
}

impl InteractionSummary {
    pub fn from_events(events: &[InteractionEvent], top_brands: usize, recent: usize) -> Self {
        let mut summary = Self::default();
        let mut categories: HashMap<String, SpendLine> = HashMap::new();
        let mut brands: HashMap<String, SpendLine> = HashMap::new();
        let mut purchases = Vec::new();

        for event in events {
            match event.event_type {
                EventType::AddToCart => summary.add_to_cart_count += 1,
                EventType::ProductClick => summary.product_click_count += 1,
                EventType::Purchase => {
                    summary.total_purchases += 1;
                    summary.total_spend += event.event_value;

                    let category = event
                        .metadata_str("category_level_2")
                        .or_else(|| event.metadata_str("category_level_1"))
                        .unwrap_or(UNCATEGORIZED)
                        .to_string();
                    let brand = event.metadata_str("brand").unwrap_or(UNKNOWN_BRAND).to_string();
                    add_spend(&mut categories, &category, event.event_value);
                    add_spend(&mut brands, &brand, event.event_value);

                    purchases.push(PurchaseLine {
                        item_id: event.item_id.clone(),
                        name: event.metadata_str("name").unwrap_or(&event.item_id).to_string(),
                        brand,
                        category,
                        price: event.event_value,
                        timestamp: event.timestamp,
                    });
                }
            }
        }

        summary.category_spend = by_spend(categories);
        summary.top_brands = by_spend(brands);
        summary.top_brands.truncate(top_brands);

        purchases.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.item_id.cmp(&b.item_id)));
        purchases.truncate(recent);
        summary.recent_purchases = purchases;
        summary
    }
}

fn add_spend(lines: &mut HashMap<String, SpendLine>, label: &str, value: f64) {
    let line = lines.entry(label.to_string()).or_insert_with(|| SpendLine {
        label: label.to_string(),
        spend: 0.0,
        purchases: 0,
    });
    line.spend += value;
    line.purchases += 1;
}

fn by_spend(lines: HashMap<String, SpendLine>) -> Vec<SpendLine> {
    let mut lines: Vec<SpendLine> = lines.into_values().collect();
    lines.sort_by(|a, b| b.spend.total_cmp(&a.spend).then_with(|| a.label.cmp(&b.label)));
    lines
}

/// Purchases with a timestamp in `[latest - window, latest]`.
pub fn purchases_in_window(
    events: &[InteractionEvent],
    latest: DateTime<Utc>,
    window: Duration,
) -> usize {
    let start = latest - window;
    events
        .iter()
        .filter(|e| e.event_type == EventType::Purchase)
        .filter(|e| e.timestamp >= start && e.timestamp <= latest)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn purchase(item: &str, brand: &str, category: &str, value: f64, minute: i64) -> InteractionEvent {
        let mut product_metadata = std::collections::BTreeMap::new();
        product_metadata.insert("brand".to_string(), json!(brand));
        product_metadata.insert("category_level_2".to_string(), json!(category));
        product_metadata.insert("name".to_string(), json!(format!("{brand} {item}")));
        InteractionEvent {
            customer: "u1".into(),
            event_type: EventType::Purchase,
            item_id: item.into(),
            event_value: value,
            product_metadata,
            timestamp: DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(minute),
        }
    }

    #[test]
    fn aggregates_spend_by_category_and_brand() {
        let mut click = purchase("x", "Acme", "Toys", 0.0, 0);
        click.event_type = EventType::ProductClick;
        let events = vec![
            purchase("a", "Acme", "Food", 40.0, 1),
            purchase("b", "Purina", "Food", 25.0, 2),
            purchase("c", "Acme", "Treats", 10.0, 3),
            click,
        ];

        let summary = InteractionSummary::from_events(&events, 1, 2);
        assert_eq!(summary.total_purchases, 3);
        assert_eq!(summary.total_spend, 75.0);
        assert_eq!(summary.product_click_count, 1);
        assert_eq!(summary.category_spend[0].label, "Food");
        assert_eq!(summary.category_spend[0].spend, 65.0);
        assert_eq!(summary.top_brands.len(), 1);
        assert_eq!(summary.top_brands[0].label, "Acme");
        let recent: Vec<&str> = summary.recent_purchases.iter().map(|p| p.item_id.as_str()).collect();
        assert_eq!(recent, ["c", "b"]);
    }

    #[test]
    fn window_is_inclusive_at_both_ends() {
        let events: Vec<_> = [0, 10, 30, 31].iter().map(|&m| purchase("a", "b", "c", 1.0, m)).collect();
        let latest = DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(30);
        assert_eq!(purchases_in_window(&events, latest, Duration::minutes(30)), 3);
    }
}
