//! Routes validated tool calls to product or article search.

use std::sync::Arc;
use std::time::{Duration, Instant};

use petwise_core::{PetProfile, PetwiseError, Result, ToolDeclaration, UserContext};
use petwise_rag::{ArticleRetriever, ProductSearch};
use petwise_telemetry::PhaseTiming;
use tracing::{info, warn};

use crate::args::{ArgumentValidator, ToolCall, ToolName, merge_unique};
use crate::envelope::{ToolEnvelope, ToolPayload};
use crate::schema::declarations;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-turn facts the dispatcher folds into tool arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnContext {
    /// The pet this turn is about, if one can be determined.
    pub pet: Option<PetProfile>,
    pub user_allergies: Vec<String>,
}

impl TurnContext {
    /// Pick the pet the message names, or the only pet when there is exactly one.
    pub fn for_turn(pets: &[PetProfile], user: Option<&UserContext>, message: &str) -> Self {
        let lowered = message.to_lowercase();
        let named = pets.iter().find(|pet| {
            let name = pet.name.trim().to_lowercase();
            !name.is_empty()
                && lowered
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|word| word == name)
        });
        let pet = named.or(if pets.len() == 1 { pets.first() } else { None }).cloned();
        Self { pet, user_allergies: user.map(|u| u.allergies.clone()).unwrap_or_default() }
    }

    /// Pet allergies first, then the customer's own list.
    pub fn allergies(&self) -> impl Iterator<Item = &String> {
        self.pet.iter().flat_map(|p| p.allergies.iter()).chain(self.user_allergies.iter())
    }
}

/// Closed tool table: schemas, validation and execution.
pub struct ToolDispatcher {
    products: Arc<ProductSearch>,
    articles: Arc<ArticleRetriever>,
    validator: ArgumentValidator,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(products: Arc<ProductSearch>, articles: Arc<ArticleRetriever>) -> Result<Self> {
        Ok(Self {
            products,
            articles,
            validator: ArgumentValidator::new()?,
            timeout: DEFAULT_TOOL_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        declarations()
    }

    /// Validate a raw model call without running anything.
    pub fn parse(&self, name: &str, arguments_json: &str) -> Result<ToolCall> {
        self.validator.parse(name, arguments_json)
    }

    /// Validate and execute one model call.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments_json: &str,
        context: &TurnContext,
    ) -> Result<ToolEnvelope> {
        let call = self.parse(name, arguments_json).inspect_err(|e| {
            warn!(tool = name, error = %e, "rejected tool call");
        })?;
        self.execute(call, context).await
    }

    pub async fn execute(&self, call: ToolCall, context: &TurnContext) -> Result<ToolEnvelope> {
        let kind = call.name();
        let started = Instant::now();

        let call = match call {
            ToolCall::SearchProducts(mut query) => {
                merge_unique(&mut query.excluded_ingredients, context.allergies());
                ToolCall::SearchProducts(query)
            }
            other => other,
        };
        let arguments = call.arguments();

        let run = async {
            match &call {
                ToolCall::SearchProducts(query) => self
                    .products
                    .search(query, context.pet.as_ref())
                    .await
                    .map(|outcome| {
                        let timings = outcome.timings.clone();
                        (ToolPayload::Products(outcome), timings)
                    }),
                ToolCall::SearchArticles(args) => {
                    let searched = Instant::now();
                    self.articles.search(&args.query).await.map(|hits| {
                        let timings = vec![PhaseTiming::new("search", searched.elapsed())];
                        (ToolPayload::Articles(hits), timings)
                    })
                }
            }
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok((payload, timings))) => {
                let envelope =
                    ToolEnvelope { kind, arguments, payload, timings, timed_out: false };
                let results = envelope.products().len() + envelope.articles().len();
                info!(
                    tool = %kind,
                    results,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool call completed"
                );
                Ok(envelope)
            }
            Ok(Err(e)) => {
                let error = PetwiseError::from(e);
                warn!(tool = %kind, error = %error, "tool call failed");
                Err(error)
            }
            Err(_) => {
                warn!(tool = %kind, timeout_ms = self.timeout.as_millis() as u64, "tool call timed out");
                Ok(ToolEnvelope {
                    kind,
                    arguments,
                    payload: ToolPayload::empty(kind),
                    timings: Vec::new(),
                    timed_out: true,
                })
            }
        }
    }
}
