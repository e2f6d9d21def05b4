//! # petwise-tool
//!
//! The tools the routing model can call, and the dispatcher that runs them.
//!
//! ## Overview
//!
//! Two tools exist and the table is closed:
//!
//! - `search_products` - catalog filter, vector search, ranking and match
//!   evidence, returned as product cards
//! - `search_articles` - pet-care articles with title, URL and summary
//!
//! Raw arguments from the model are checked against the same JSON schemas the
//! model was given, then decoded into typed [`ToolCall`]s. A name outside the
//! table is rejected with [`PetwiseError::UnknownTool`](petwise_core::PetwiseError)
//! before anything runs.
//!
//! ```rust,ignore
//! let dispatcher = ToolDispatcher::new(product_search, article_retriever)?;
//! let context = TurnContext::for_turn(&pets, Some(&user), "food for Rex");
//! let envelope = dispatcher.dispatch("search_products", r#"{"query":"dog food"}"#, &context).await?;
//! println!("{}", envelope.model_output());
//! ```

pub mod args;
pub mod dispatcher;
pub mod envelope;
pub mod schema;

pub use args::{ArgumentValidator, SearchArticlesArgs, ToolCall, ToolName, merge_unique};
pub use dispatcher::{DEFAULT_TOOL_TIMEOUT, ToolDispatcher, TurnContext};
pub use envelope::{ToolEnvelope, ToolPayload};
pub use schema::{CATEGORY_LEVEL_1, CATEGORY_LEVEL_2, SEARCH_ARTICLES, SEARCH_PRODUCTS, declarations};
