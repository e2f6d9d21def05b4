//! The user/pet/interaction store the assistant reads from and the persona
//! updater writes to.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use petwise_core::{InteractionEvent, PetProfile, Result, UserContext};
use tokio::sync::RwLock;

/// Customer records consumed by the assistant.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_context(&self, user_id: &str) -> Result<Option<UserContext>>;

    async fn pets(&self, user_id: &str) -> Result<Vec<PetProfile>>;

    async fn persona(&self, user_id: &str) -> Result<Option<String>>;

    /// Overwrite the stored persona. Last writer wins.
    async fn set_persona(&self, user_id: &str, persona: &str) -> Result<()>;

    async fn record_interaction(&self, event: InteractionEvent) -> Result<()>;

    /// Every interaction of one customer, oldest first.
    async fn interactions(&self, user_id: &str) -> Result<Vec<InteractionEvent>>;

    /// Append a user chat message and return how many the customer has sent.
    async fn record_message(&self, user_id: &str, text: &str) -> Result<usize>;

    /// The newest `limit` user messages, oldest first.
    async fn recent_messages(&self, user_id: &str, limit: usize) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Default)]
struct CustomerRecord {
    context: Option<UserContext>,
    pets: Vec<PetProfile>,
    interactions: Vec<InteractionEvent>,
    messages: Vec<String>,
}

/// A process-local [`UserStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    customers: Arc<RwLock<HashMap<String, CustomerRecord>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_user(&self, context: UserContext) {
        let mut customers = self.customers.write().await;
        let user_id = context.user_id.clone();
        customers.entry(user_id).or_default().context = Some(context);
    }

    pub async fn add_pet(&self, user_id: &str, pet: PetProfile) {
        let mut customers = self.customers.write().await;
        customers.entry(user_id.to_string()).or_default().pets.push(pet);
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn user_context(&self, user_id: &str) -> Result<Option<UserContext>> {
        Ok(self.customers.read().await.get(user_id).and_then(|c| c.context.clone()))
    }

    async fn pets(&self, user_id: &str) -> Result<Vec<PetProfile>> {
        Ok(self.customers.read().await.get(user_id).map(|c| c.pets.clone()).unwrap_or_default())
    }

    async fn persona(&self, user_id: &str) -> Result<Option<String>> {
        let customers = self.customers.read().await;
        Ok(customers
            .get(user_id)
            .and_then(|c| c.context.as_ref())
            .and_then(|ctx| ctx.persona_summary.clone()))
    }

    async fn set_persona(&self, user_id: &str, persona: &str) -> Result<()> {
        let mut customers = self.customers.write().await;
        let record = customers.entry(user_id.to_string()).or_default();
        record
            .context
            .get_or_insert_with(|| UserContext::new(user_id))
            .persona_summary = Some(persona.to_string());
        Ok(())
    }

    async fn record_interaction(&self, event: InteractionEvent) -> Result<()> {
        let mut customers = self.customers.write().await;
        let record = customers.entry(event.customer.clone()).or_default();
        let at = record.interactions.partition_point(|e| e.timestamp <= event.timestamp);
        record.interactions.insert(at, event);
        Ok(())
    }

    async fn interactions(&self, user_id: &str) -> Result<Vec<InteractionEvent>> {
        Ok(self
            .customers
            .read()
            .await
            .get(user_id)
            .map(|c| c.interactions.clone())
            .unwrap_or_default())
    }

    async fn record_message(&self, user_id: &str, text: &str) -> Result<usize> {
        let mut customers = self.customers.write().await;
        let record = customers.entry(user_id.to_string()).or_default();
        record.messages.push(text.to_string());
        Ok(record.messages.len())
    }

    async fn recent_messages(&self, user_id: &str, limit: usize) -> Result<Vec<String>> {
        let customers = self.customers.read().await;
        Ok(customers
            .get(user_id)
            .map(|c| c.messages[c.messages.len().saturating_sub(limit)..].to_vec())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use petwise_core::EventType;

    fn event(minutes_ago: i64) -> InteractionEvent {
        InteractionEvent {
            customer: "u1".into(),
            event_type: EventType::Purchase,
            item_id: format!("item-{minutes_ago}"),
            event_value: 10.0,
            product_metadata: Default::default(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn interactions_stay_in_time_order() {
        let store = InMemoryUserStore::new();
        for minutes in [5, 20, 1] {
            store.record_interaction(event(minutes)).await.unwrap();
        }
        let ids: Vec<String> =
            store.interactions("u1").await.unwrap().into_iter().map(|e| e.item_id).collect();
        assert_eq!(ids, ["item-20", "item-5", "item-1"]);
    }

    #[tokio::test]
    async fn persona_is_created_on_first_write() {
        let store = InMemoryUserStore::new();
        assert_eq!(store.persona("u2").await.unwrap(), None);
        store.set_persona("u2", "Buys grain-free food.").await.unwrap();
        assert_eq!(store.persona("u2").await.unwrap().as_deref(), Some("Buys grain-free food."));
        assert_eq!(store.user_context("u2").await.unwrap().unwrap().user_id, "u2");
    }

    #[tokio::test]
    async fn messages_are_counted_and_windowed() {
        let store = InMemoryUserStore::new();
        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            assert_eq!(store.record_message("u1", text).await.unwrap(), i + 1);
        }
        assert_eq!(store.recent_messages("u1", 2).await.unwrap(), ["b", "c"]);
        assert!(store.recent_messages("nobody", 2).await.unwrap().is_empty());
    }
}
