//! The assistant as callers see it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use petwise_core::{ChatTurn, InteractionEvent, Llm, PetwiseError, Result};
use petwise_eval::EvalLogWriter;
use petwise_memory::{PersonaConfig, PersonaUpdater, UserStore};
use petwise_model::openai::{OpenAIClient, OpenAIConfig};
use petwise_rag::{
    ArticleRetriever, CachedEmbeddingProvider, Catalog, EmbeddingProvider, InMemoryVectorStore, MatchAnalyzer,
    OpenAIEmbeddingProvider, ProductCard, ProductRetriever, ProductSearch, RagConfig, VectorGateway,
};
use petwise_tool::ToolDispatcher;
use tracing::{info, warn};

use crate::config::{AppConfig, OrchestratorConfig};
use crate::greeter::{Greeting, personalized_greeting};
use crate::orchestrator::{TurnHandle, TurnOrchestrator, TurnRequest};
use crate::product_qa::ProductQa;

/// Chat turns, interaction logging, greetings and product questions behind one handle.
pub struct Assistant {
    orchestrator: TurnOrchestrator,
    store: Arc<dyn UserStore>,
    persona: Option<PersonaUpdater>,
    qa: ProductQa,
}

impl Assistant {
    pub fn new(orchestrator: TurnOrchestrator, store: Arc<dyn UserStore>, qa: ProductQa) -> Self {
        Self { orchestrator, store, persona: None, qa }
    }

    /// Route both persona triggers through `persona`.
    pub fn with_persona(mut self, persona: PersonaUpdater) -> Self {
        self.orchestrator = self.orchestrator.with_persona(persona.clone());
        self.persona = Some(persona);
        self
    }

    /// Wire the OpenAI-backed pipeline from process configuration.
    pub fn from_config(config: &AppConfig, store: Arc<dyn UserStore>) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            PetwiseError::Config("set PETWISE_OPENAI_API_KEY or OPENAI_API_KEY".into())
        })?;

        let llm: Arc<dyn Llm> = Arc::new(OpenAIClient::new(
            OpenAIConfig::new(api_key.clone(), config.compose_model.clone())
                .with_base_url(config.base_url.clone())
                .with_timeout(config.llm_timeout),
        )?);

        let mut rag = RagConfig::builder()
            .retriever_cache_size(config.retriever_cache_size)
            .embedding_cache_size(config.embedding_cache_size)
            .search_queue_limit(config.search_queue_limit);
        if let Some(n) = config.search_concurrency {
            rag = rag.search_concurrency(n);
        }
        let rag = rag.build()?;

        let embedder = OpenAIEmbeddingProvider::new(api_key)?
            .with_model(config.embedding_model.clone())
            .with_base_url(config.base_url.clone())
            .with_timeout(config.llm_timeout)?;
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(CachedEmbeddingProvider::new(
            Arc::new(embedder),
            rag.embedding_cache_size,
            rag.cache_shards,
        ));

        let catalog = Arc::new(Catalog::load_path(&config.catalog_path)?);
        let vectors = Arc::new(InMemoryVectorStore::load_dir(&config.vector_store_path)?);
        let gateway = Arc::new(
            VectorGateway::new(vectors, embedder).with_retry_delay(Duration::from_millis(rag.retry_delay_ms)),
        );
        info!(
            products = catalog.len(),
            catalog = %config.catalog_path.display(),
            vector_store = %config.vector_store_path.display(),
            "retrieval data loaded"
        );

        let retriever = Arc::new(ProductRetriever::new(Arc::clone(&catalog), Arc::clone(&gateway), &rag));
        let search = Arc::new(ProductSearch::new(retriever, MatchAnalyzer::new(rag.match_top_m)));
        let articles = Arc::new(
            ArticleRetriever::new(Arc::clone(&gateway))
                .with_collection(rag.article_collection.clone())
                .with_top_k(rag.article_top_k),
        );
        let dispatcher = Arc::new(ToolDispatcher::new(search, articles)?.with_timeout(config.tool_timeout));

        let orchestrator_config = OrchestratorConfig::builder()
            .route_model(config.route_model.clone())
            .compose_model(config.compose_model.clone())
            .build()?;
        let orchestrator = TurnOrchestrator::new(Arc::clone(&llm), dispatcher, Arc::clone(&store), orchestrator_config)
            .with_eval_writer(EvalLogWriter::new(config.eval_log_dir.clone()));

        let persona_config = PersonaConfig::builder()
            .model(config.persona_model.clone())
            .message_window(config.persona_message_window)
            .burst_threshold(config.burst_threshold)
            .burst_window(config.burst_window)
            .build()?;
        let persona = PersonaUpdater::new(Arc::clone(&llm), Arc::clone(&store), persona_config);

        let qa = ProductQa::new(llm, gateway, catalog, config.compose_model.clone())
            .with_collection(rag.product_collection.clone());

        Ok(Self::new(orchestrator, store, qa).with_persona(persona))
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> TurnHandle {
        self.orchestrator.handle_turn(request).await
    }

    /// Record a purchase, add-to-cart or click. May schedule a persona update.
    pub async fn log_interaction(&self, event: InteractionEvent) -> Result<()> {
        match &self.persona {
            Some(persona) => {
                persona.on_interaction(event).await?;
            }
            None => self.store.record_interaction(event).await?,
        }
        Ok(())
    }

    /// Greeting for today's date.
    pub async fn personalized_greeting(&self, user_id: &str) -> Greeting {
        self.personalized_greeting_on(user_id, Utc::now().date_naive()).await
    }

    pub async fn personalized_greeting_on(&self, user_id: &str, today: NaiveDate) -> Greeting {
        let user = self.store.user_context(user_id).await.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "failed to load user context for greeting");
            None
        });
        let pets = self.store.pets(user_id).await.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "failed to load pets for greeting");
            Vec::new()
        });
        personalized_greeting(user.as_ref(), &pets, today)
    }

    pub async fn compare_products(&self, question: &str, products: &[ProductCard], history: &[ChatTurn]) -> String {
        self.qa.compare_products(question, products, history).await
    }

    pub async fn ask_about_product(&self, question: &str, product: &ProductCard, history: &[ChatTurn]) -> String {
        self.qa.ask_about_product(question, product, history).await
    }
}
