//! One chat turn, from the user's message to a streamed reply.
//!
//! A turn moves through `Init → Route → (Tool | Direct) → Compose → Stream →
//! Done`, with `Error` reachable from the model calls. The routing call decides
//! between answering directly and calling tools; tool results are folded back
//! in as function outputs plus evidence instructions, and a second streaming
//! call composes the answer.
//!
//! Nothing on the reply path returns an error. Model failures become the
//! sentinel apology, tool failures become an apology instruction, and a
//! saturated search queue becomes a direct "busy" reply. The evaluation log
//! for the turn is assembled by the turn alone and published once the reply
//! stream completes or is dropped.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use petwise_core::{
    ChatTurn, Content, FunctionCall, Llm, LlmRequest, Part, PetProfile, PetwiseError, ROLE_ASSISTANT,
    ROLE_TOOL, UserContext,
};
use petwise_eval::{EvalLogWriter, EvaluationLog, EvaluationLogBuilder, ProductSummary, ToolCallRecord};
use petwise_memory::{PersonaUpdater, UserStore};
use petwise_rag::{ArticleHit, ProductCard};
use petwise_telemetry::{PhaseTimer, PhaseTiming};
use petwise_tool::{ToolDispatcher, ToolEnvelope, ToolName, ToolPayload, TurnContext};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capture::{CompletedReply, ReplyStream, capture, capture_text};
use crate::config::OrchestratorConfig;
use crate::evidence::format_evidence;
use crate::prompts::{ARTICLES_FOUND, BUSY_REPLY, NOTHING_MATCHED, SENTINEL_REPLY, TOOL_FAILED, system_prompt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Init,
    Route,
    Tool,
    Direct,
    Compose,
    Stream,
    Done,
    Error,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Route => "route",
            Self::Tool => "tool",
            Self::Direct => "direct",
            Self::Compose => "compose",
            Self::Stream => "stream",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// A user message and the conversation before it.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub user_id: String,
    pub text: String,
    /// Image URL or data URL sent with the message.
    pub image: Option<String>,
    pub history: Vec<ChatTurn>,
}

impl TurnRequest {
    pub fn new(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), text: text.into(), ..Default::default() }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }
}

/// What the turn looked like once the reply was over.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: CompletedReply,
    pub log: EvaluationLog,
    /// Where the log was written, when a writer is configured and the write succeeded.
    pub log_path: Option<PathBuf>,
    pub states: Vec<TurnState>,
}

/// The live result of [`TurnOrchestrator::handle_turn`].
///
/// Products and articles are fixed at tool time; the reply streams afterwards.
/// `finished` resolves after the stream ends or is dropped and the log is
/// published.
pub struct TurnHandle {
    pub turn_id: Uuid,
    pub stream: ReplyStream,
    pub products: Vec<ProductCard>,
    pub articles: Vec<ArticleHit>,
    pub finished: oneshot::Receiver<TurnOutcome>,
}

/// Ordered state transitions of one turn.
#[derive(Debug, Clone)]
struct TurnTrace {
    turn_id: Uuid,
    states: Vec<TurnState>,
}

impl TurnTrace {
    fn new(turn_id: Uuid) -> Self {
        debug!(turn_id = %turn_id, state = %TurnState::Init, "turn state");
        Self { turn_id, states: vec![TurnState::Init] }
    }

    fn advance(&mut self, next: TurnState) {
        let from = self.states.last().copied().unwrap_or(TurnState::Init);
        debug!(turn_id = %self.turn_id, %from, to = %next, "turn state");
        self.states.push(next);
    }

    fn failed(&self) -> bool {
        self.states.contains(&TurnState::Error)
    }
}

/// Everything the completion callback needs to publish the turn.
struct TurnFinish {
    user_id: String,
    text: String,
    builder: EvaluationLogBuilder,
    trace: TurnTrace,
    timings: Vec<PhaseTiming>,
    /// Set when the reply comes from a compose stream: time spent before the stream opened.
    compose_wait: Option<Duration>,
    store: Arc<dyn UserStore>,
    persona: Option<PersonaUpdater>,
    eval: Option<Arc<EvalLogWriter>>,
    tx: oneshot::Sender<TurnOutcome>,
}

impl TurnFinish {
    fn complete(self, reply: CompletedReply) {
        let Self { user_id, text, mut builder, mut trace, mut timings, compose_wait, store, persona, eval, tx } =
            self;

        if let Some(wait) = compose_wait {
            if let Some(first) = reply.first_chunk {
                timings.push(PhaseTiming::new("compose_first_token", wait + first));
            }
            timings.push(PhaseTiming::new("compose_total", wait + reply.elapsed));
        }
        builder.timings(timings);
        if reply.partial {
            builder.error("reply stream ended early");
        }
        if !trace.failed() {
            trace.advance(TurnState::Done);
        }
        let log = builder.finish(reply.cleaned.clone(), reply.buttons.clone(), reply.partial);
        info!(
            turn_id = %log.turn_id,
            user_id = %user_id,
            tools = log.tool_calls.len(),
            products = log.products.len(),
            partial = log.partial,
            "turn finished"
        );

        let states = trace.states;
        let turn_id = log.turn_id;
        let publish = async move {
            let log_path = match &eval {
                Some(writer) => match writer.write(&log).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(turn_id = %log.turn_id, error = %e, "failed to write evaluation log");
                        None
                    }
                },
                None => None,
            };

            let recorded = match &persona {
                Some(persona) => persona.on_user_message(&user_id, &text).await.map(|_| ()),
                None => store.record_message(&user_id, &text).await.map(|_| ()),
            };
            if let Err(e) = recorded {
                warn!(user_id = %user_id, error = %e, "failed to record user message");
            }

            let _ = tx.send(TurnOutcome { reply, log, log_path, states });
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(publish);
            }
            Err(_) => warn!(turn_id = %turn_id, "no runtime to publish the turn; log dropped"),
        }
    }
}

/// Runs chat turns. Shared across concurrent turns; holds no per-turn state.
pub struct TurnOrchestrator {
    llm: Arc<dyn Llm>,
    dispatcher: Arc<ToolDispatcher>,
    store: Arc<dyn UserStore>,
    persona: Option<PersonaUpdater>,
    eval: Option<Arc<EvalLogWriter>>,
    config: OrchestratorConfig,
}

impl TurnOrchestrator {
    pub fn new(
        llm: Arc<dyn Llm>,
        dispatcher: Arc<ToolDispatcher>,
        store: Arc<dyn UserStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { llm, dispatcher, store, persona: None, eval: None, config }
    }

    pub fn with_persona(mut self, persona: PersonaUpdater) -> Self {
        self.persona = Some(persona);
        self
    }

    pub fn with_eval_writer(mut self, writer: EvalLogWriter) -> Self {
        self.eval = Some(Arc::new(writer));
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    async fn load_customer(&self, user_id: &str) -> (Option<UserContext>, Vec<PetProfile>) {
        let user = self.store.user_context(user_id).await.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "failed to load user context");
            None
        });
        let pets = self.store.pets(user_id).await.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "failed to load pets");
            Vec::new()
        });
        (user, pets)
    }

    /// Run one turn. Never fails: every failure becomes a reply.
    pub async fn handle_turn(&self, request: TurnRequest) -> TurnHandle {
        let mut builder = EvaluationLogBuilder::new(&request.user_id, &request.text)
            .with_image(request.image.is_some());
        let turn_id = builder.turn_id();
        let mut trace = TurnTrace::new(turn_id);
        let mut timer = PhaseTimer::new();

        let (user, pets) = self.load_customer(&request.user_id).await;
        let mut contents = vec![Content::system(system_prompt(user.as_ref(), &pets))];
        contents.extend(request.history.iter().map(ChatTurn::to_content));
        let mut message = Content::user(request.text.clone());
        if let Some(image) = &request.image {
            message = message.with_image(image.clone());
        }
        contents.push(message);

        trace.advance(TurnState::Route);
        let route = LlmRequest::new(self.config.route_model.clone(), contents.clone())
            .with_tools(self.dispatcher.declarations())
            .with_temperature(self.config.temperature);
        let routed = timer.time("route_llm", self.llm.generate(route)).await;

        let response = match routed {
            Ok(response) => response,
            Err(e) => {
                error!(turn_id = %turn_id, error = %e, "routing call failed");
                builder.error(format!("route: {e}"));
                trace.advance(TurnState::Error);
                return self.reply_now(&request, SENTINEL_REPLY.to_string(), builder, trace, timer);
            }
        };

        let calls: Vec<FunctionCall> =
            response.function_calls().into_iter().take(self.config.max_tool_calls).cloned().collect();
        if calls.is_empty() {
            trace.advance(TurnState::Direct);
            let text = response.text().unwrap_or_default();
            let text = if text.trim().is_empty() { SENTINEL_REPLY.to_string() } else { text };
            return self.reply_now(&request, text, builder, trace, timer);
        }

        trace.advance(TurnState::Tool);
        let context = TurnContext::for_turn(&pets, user.as_ref(), &request.text);
        let mut products = Vec::new();
        let mut articles = Vec::new();
        let mut instructions: Vec<String> = Vec::new();
        let mut summaries: Vec<ProductSummary> = Vec::new();
        let mut call_parts = Content::new(ROLE_ASSISTANT);
        let mut output_parts = Content::new(ROLE_TOOL);

        for call in &calls {
            let started = Instant::now();
            let dispatched = self.dispatcher.dispatch(&call.name, &call.arguments_json, &context).await;
            let phase = call
                .name
                .parse::<ToolName>()
                .map(|n| n.phase_name())
                .unwrap_or_else(|_| format!("tool:{}", call.name));
            timer.record(phase.clone(), started.elapsed());

            let raw_args = serde_json::from_str(&call.arguments_json)
                .unwrap_or_else(|_| Value::String(call.arguments_json.clone()));

            let output = match dispatched {
                Ok(envelope) => {
                    timer.extend_prefixed(&format!("{phase}/"), envelope.timings.clone());
                    builder.tool_call(ToolCallRecord {
                        name: envelope.kind.to_string(),
                        arguments: envelope.arguments.clone(),
                        result_count: envelope.products().len() + envelope.articles().len(),
                        timed_out: envelope.timed_out,
                        error: None,
                    });
                    if envelope.timed_out {
                        builder.error(format!("{}: timed out", envelope.kind));
                    }
                    self.fold_envelope(&envelope, &mut instructions, &mut summaries);
                    products.extend(envelope.products().iter().cloned());
                    articles.extend(envelope.articles().iter().cloned());
                    envelope.model_output()
                }
                Err(e) if e.is_busy() => {
                    warn!(turn_id = %turn_id, tool = %call.name, "product search is saturated");
                    builder.tool_call(failed_record(call, raw_args, &e));
                    builder.error(format!("{}: {e}", call.name));
                    trace.advance(TurnState::Direct);
                    return self.reply_now(&request, BUSY_REPLY.to_string(), builder, trace, timer);
                }
                Err(e) => {
                    builder.tool_call(failed_record(call, raw_args.clone(), &e));
                    builder.error(format!("{}: {e}", call.name));
                    push_once(&mut instructions, TOOL_FAILED);
                    format!("Error: {e}")
                }
            };

            call_parts = call_parts.with_part(Part::FunctionCall {
                id: Some(call.id.clone()),
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                args: raw_args,
            });
            output_parts = output_parts.with_part(Part::FunctionResponse {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                output,
            });
        }

        builder.products(summaries);
        contents.push(call_parts);
        contents.push(output_parts);
        contents.extend(instructions.into_iter().map(Content::user));

        trace.advance(TurnState::Compose);
        let compose_started = Instant::now();
        let compose = LlmRequest::new(self.config.compose_model.clone(), contents)
            .with_temperature(self.config.temperature);
        let (tx, finished) = oneshot::channel();
        let stream = match self.llm.generate_stream(compose).await {
            Ok(events) => {
                trace.advance(TurnState::Stream);
                let mut finish = self.finisher(&request, builder, trace, timer, tx);
                finish.compose_wait = Some(compose_started.elapsed());
                capture(events, move |reply| finish.complete(reply))
            }
            Err(e) => {
                error!(turn_id = %turn_id, error = %e, "compose call failed");
                builder.error(format!("compose: {e}"));
                trace.advance(TurnState::Error);
                let finish = self.finisher(&request, builder, trace, timer, tx);
                capture_text(SENTINEL_REPLY, move |reply| finish.complete(reply))
            }
        };

        TurnHandle { turn_id, stream, products, articles, finished }
    }

    /// Turn the envelope into compose instructions and log rows.
    fn fold_envelope(
        &self,
        envelope: &ToolEnvelope,
        instructions: &mut Vec<String>,
        summaries: &mut Vec<ProductSummary>,
    ) {
        match &envelope.payload {
            ToolPayload::Products(outcome) => {
                if envelope.timed_out {
                    push_once(instructions, TOOL_FAILED);
                } else if let Some(evidence) = format_evidence(outcome, self.config.evidence) {
                    instructions.push(evidence);
                } else {
                    push_once(instructions, NOTHING_MATCHED);
                }
                let offset = summaries.len();
                summaries.extend(outcome.cards.iter().enumerate().map(|(i, card)| ProductSummary {
                    rank: offset + i + 1,
                    product_id: card.product_id.clone(),
                    name: card.name.clone(),
                    brand: card.brand.clone(),
                    score: card.score,
                    matched_fields: card.matches.iter().map(|m| m.field_name.clone()).collect(),
                }));
            }
            ToolPayload::Articles(hits) if !hits.is_empty() => push_once(instructions, ARTICLES_FOUND),
            ToolPayload::Articles(_) => {}
        }
    }

    fn finisher(
        &self,
        request: &TurnRequest,
        builder: EvaluationLogBuilder,
        trace: TurnTrace,
        timer: PhaseTimer,
        tx: oneshot::Sender<TurnOutcome>,
    ) -> TurnFinish {
        TurnFinish {
            user_id: request.user_id.clone(),
            text: request.text.clone(),
            builder,
            trace,
            timings: timer.into_phases(),
            compose_wait: None,
            store: Arc::clone(&self.store),
            persona: self.persona.clone(),
            eval: self.eval.clone(),
            tx,
        }
    }

    /// Stream a reply that needs no compose call.
    fn reply_now(
        &self,
        request: &TurnRequest,
        text: String,
        builder: EvaluationLogBuilder,
        mut trace: TurnTrace,
        timer: PhaseTimer,
    ) -> TurnHandle {
        let turn_id = trace.turn_id;
        if !trace.failed() {
            trace.advance(TurnState::Stream);
        }
        let (tx, finished) = oneshot::channel();
        let finish = self.finisher(request, builder, trace, timer, tx);
        let stream = capture_text(text, move |reply| finish.complete(reply));
        TurnHandle { turn_id, stream, products: Vec::new(), articles: Vec::new(), finished }
    }
}

fn failed_record(call: &FunctionCall, arguments: Value, error: &PetwiseError) -> ToolCallRecord {
    ToolCallRecord {
        name: call.name.clone(),
        arguments,
        result_count: 0,
        timed_out: false,
        error: Some(error.to_string()),
    }
}

fn push_once(instructions: &mut Vec<String>, text: &str) {
    if !instructions.iter().any(|i| i == text) {
        instructions.push(text.to_string());
    }
}
