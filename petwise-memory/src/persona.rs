//! Background persona maintenance.
//!
//! Two triggers schedule an update:
//!
//! - **Message window**: every `message_window`-th user message.
//! - **Purchase burst**: logging an interaction when at least
//!   `burst_threshold` purchases fall within `burst_window` ending at that
//!   interaction's timestamp.
//!
//! Updates run on their own task and never block the caller. The model answers
//! `{"update_needed": bool, "persona_summary": string}`; the store is written
//! only when an update is requested and the text actually changed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use petwise_core::{Content, InteractionEvent, Llm, LlmRequest, PetwiseError, Result};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::UserStore;
use crate::summary::{InteractionSummary, purchases_in_window};

const PERSONA_INSTRUCTIONS: &str = "You maintain a short persona summary for a customer of an online pet supply store. \
The summary describes their pets, what they buy, brand and diet preferences, budget signals and shopping habits, \
in at most four sentences. Compare the new evidence with the current summary. If the evidence adds or changes \
something meaningful, set update_needed to true and write the complete revised summary. Otherwise set \
update_needed to false and repeat the current summary unchanged. \
Respond with a JSON object: {\"update_needed\": boolean, \"persona_summary\": string}.";

/// What caused an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaTrigger {
    MessageWindow,
    PurchaseBurst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaDecision {
    pub update_needed: bool,
    #[serde(default)]
    pub persona_summary: String,
}

impl PersonaDecision {
    /// Parse the model's reply, tolerating prose or fences around the object.
    pub fn parse(reply: &str) -> Result<Self> {
        let start = reply.find('{');
        let end = reply.rfind('}');
        let json = match (start, end) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => reply,
        };
        serde_json::from_str(json)
            .map_err(|e| PetwiseError::Model(format!("persona reply is not the expected JSON: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonaConfig {
    /// Model id; empty uses the provider default.
    pub model: String,
    pub temperature: f32,
    /// K: run the message trigger every K user messages.
    pub message_window: usize,
    /// How many recent messages the message trigger sends.
    pub recent_messages: usize,
    pub burst_threshold: usize,
    pub burst_window: Duration,
    pub top_brands: usize,
    pub recent_purchases: usize,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.1,
            message_window: 4,
            recent_messages: 8,
            burst_threshold: 3,
            burst_window: Duration::from_secs(30 * 60),
            top_brands: 5,
            recent_purchases: 10,
        }
    }
}

impl PersonaConfig {
    pub fn builder() -> PersonaConfigBuilder {
        PersonaConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct PersonaConfigBuilder {
    config: PersonaConfig,
}

impl PersonaConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn message_window(mut self, n: usize) -> Self {
        self.config.message_window = n;
        self
    }

    pub fn recent_messages(mut self, n: usize) -> Self {
        self.config.recent_messages = n;
        self
    }

    pub fn burst_threshold(mut self, n: usize) -> Self {
        self.config.burst_threshold = n;
        self
    }

    pub fn burst_window(mut self, window: Duration) -> Self {
        self.config.burst_window = window;
        self
    }

    pub fn top_brands(mut self, n: usize) -> Self {
        self.config.top_brands = n;
        self
    }

    pub fn recent_purchases(mut self, n: usize) -> Self {
        self.config.recent_purchases = n;
        self
    }

    pub fn build(self) -> Result<PersonaConfig> {
        let c = self.config;
        if c.message_window == 0 {
            return Err(PetwiseError::Config("message_window must be at least 1".into()));
        }
        if c.burst_threshold == 0 {
            return Err(PetwiseError::Config("burst_threshold must be at least 1".into()));
        }
        if c.burst_window.is_zero() {
            return Err(PetwiseError::Config("burst_window must be positive".into()));
        }
        Ok(c)
    }
}

struct Inner {
    llm: Arc<dyn Llm>,
    store: Arc<dyn UserStore>,
    config: PersonaConfig,
    scheduled: AtomicUsize,
}

/// Schedules and runs persona updates. Cheap to clone.
#[derive(Clone)]
pub struct PersonaUpdater {
    inner: Arc<Inner>,
}

impl PersonaUpdater {
    pub fn new(llm: Arc<dyn Llm>, store: Arc<dyn UserStore>, config: PersonaConfig) -> Self {
        Self { inner: Arc::new(Inner { llm, store, config, scheduled: AtomicUsize::new(0) }) }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &PersonaConfig {
        &self.inner.config
    }

    /// Number of update tasks scheduled so far.
    pub fn scheduled(&self) -> usize {
        self.inner.scheduled.load(Ordering::SeqCst)
    }

    /// Record a user message and schedule an update on every K-th one.
    pub async fn on_user_message(&self, user_id: &str, text: &str) -> Result<Option<JoinHandle<()>>> {
        let count = self.inner.store.record_message(user_id, text).await?;
        if count % self.inner.config.message_window != 0 {
            return Ok(None);
        }
        Ok(Some(self.schedule(user_id, PersonaTrigger::MessageWindow)))
    }

    /// Record an interaction and schedule an update when it completes a purchase burst.
    pub async fn on_interaction(&self, event: InteractionEvent) -> Result<Option<JoinHandle<()>>> {
        let user_id = event.customer.clone();
        let latest = event.timestamp;
        self.inner.store.record_interaction(event).await?;

        let events = self.inner.store.interactions(&user_id).await?;
        let window = chrono::Duration::from_std(self.inner.config.burst_window)
            .map_err(|e| PetwiseError::Config(format!("burst window out of range: {e}")))?;
        let purchases = purchases_in_window(&events, latest, window);
        if purchases < self.inner.config.burst_threshold {
            return Ok(None);
        }
        debug!(user_id = %user_id, purchases, "purchase burst detected");
        Ok(Some(self.schedule(&user_id, PersonaTrigger::PurchaseBurst)))
    }

    fn schedule(&self, user_id: &str, trigger: PersonaTrigger) -> JoinHandle<()> {
        self.inner.scheduled.fetch_add(1, Ordering::SeqCst);
        info!(user_id = %user_id, ?trigger, "persona update scheduled");

        let updater = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            match updater.run(&user_id, trigger).await {
                Ok(true) => info!(user_id = %user_id, ?trigger, "persona updated"),
                Ok(false) => debug!(user_id = %user_id, ?trigger, "persona unchanged"),
                Err(e) => warn!(user_id = %user_id, ?trigger, error = %e, "persona update failed"),
            }
        })
    }

    /// Run one update now. Returns whether the stored persona changed.
    pub async fn run(&self, user_id: &str, trigger: PersonaTrigger) -> Result<bool> {
        let store = &self.inner.store;
        let config = &self.inner.config;
        let current = store.persona(user_id).await?.unwrap_or_default();

        let evidence = match trigger {
            PersonaTrigger::MessageWindow => {
                let messages = store.recent_messages(user_id, config.recent_messages).await?;
                let lines: Vec<String> = messages.iter().map(|m| format!("- {m}")).collect();
                format!("Recent customer messages:\n{}", lines.join("\n"))
            }
            PersonaTrigger::PurchaseBurst => {
                let events = store.interactions(user_id).await?;
                let summary = InteractionSummary::from_events(
                    &events,
                    config.top_brands,
                    config.recent_purchases,
                );
                format!("Purchase summary:\n{}", serde_json::to_string_pretty(&summary)?)
            }
        };
        let current_label = if current.trim().is_empty() { "(none yet)" } else { current.trim() };
        let prompt = format!("Current persona summary:\n{current_label}\n\n{evidence}");

        let request = LlmRequest::new(
            config.model.clone(),
            vec![Content::system(PERSONA_INSTRUCTIONS), Content::user(prompt)],
        )
        .with_temperature(config.temperature)
        .with_json_object();

        let reply = self.inner.llm.generate(request).await?;
        let decision = PersonaDecision::parse(&reply.text().unwrap_or_default())?;

        let revised = decision.persona_summary.trim();
        if !decision.update_needed || revised.is_empty() || revised == current.trim() {
            return Ok(false);
        }
        store.set_persona(user_id, revised).await?;
        Ok(true)
    }
}
