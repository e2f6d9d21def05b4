//! # petwise-rag
//!
//! Product and article retrieval for the Petwise shopping assistant.
//!
//! ## Overview
//!
//! A product search runs in four stages:
//!
//! 1. [`Catalog::filter`] narrows the catalog with ingredient and category
//!    constraints.
//! 2. [`VectorGateway`] embeds the query and runs a cosine search over the
//!    `review_synthesis` collection restricted to the surviving ids.
//! 3. [`rank`] blends rating, popularity, relevance, and content-quality
//!    signals into one total order.
//! 4. [`MatchAnalyzer`] explains each top product with [`SearchMatch`] evidence.
//!
//! [`ProductRetriever`] memoizes stages 1–2 in a sharded LRU and bounds how
//! many searches run at once. [`ProductSearch`] wires all four stages together
//! and produces [`ProductCard`]s.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use petwise_rag::*;
//!
//! let config = RagConfig::builder().max_candidates(300).build()?;
//! let catalog = Arc::new(Catalog::load_path("data/products.tsv")?);
//! let store = Arc::new(InMemoryVectorStore::load_dir("data/vector_store")?);
//! let embedder = Arc::new(HashingEmbeddingProvider::default());
//! let gateway = Arc::new(VectorGateway::new(store, embedder));
//! let retriever = Arc::new(ProductRetriever::new(catalog, gateway, &config));
//! let search = ProductSearch::new(retriever, MatchAnalyzer::new(config.match_top_m));
//!
//! let outcome = search.search(&ProductQuery::new("puppy food"), None).await?;
//! ```

pub mod analyzer;
pub mod articles;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod gateway;
pub mod inmemory;
pub mod openai;
pub mod ranker;
pub mod retriever;
pub mod search;
pub mod text;
pub mod vectorstore;

pub use analyzer::{EXCLUDED_FIELD, MatchAnalyzer, ProductMatches, QueryTerms, SearchMatch};
pub use articles::{ArticleHit, ArticleRetriever};
pub use cache::ShardedLru;
pub use catalog::{Catalog, Product};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{IndexRecord, Metadata, MetadataValue, RetrievalResult};
pub use embedding::{CachedEmbeddingProvider, EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{RagError, Result};
pub use gateway::VectorGateway;
pub use inmemory::InMemoryVectorStore;
pub use openai::OpenAIEmbeddingProvider;
pub use ranker::{RankedCandidate, ScoreBreakdown, rank, score_breakdown};
pub use retriever::{ProductQuery, ProductRetriever};
pub use search::{ProductCard, ProductSearch, SearchOutcome, card_from_metadata};
pub use vectorstore::{ARTICLE_COLLECTION, PRODUCT_COLLECTION, VectorStore};
