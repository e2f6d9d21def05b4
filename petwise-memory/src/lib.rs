//! # petwise-memory
//!
//! Customer records and the persona they accumulate.
//!
//! - [`UserStore`] - the user/pet/interaction store, with [`InMemoryUserStore`]
//! - [`InteractionSummary`] - purchase history rolled up for prompting
//! - [`PersonaUpdater`] - message-window and purchase-burst triggers that
//!   revise the stored persona in the background

pub mod persona;
pub mod store;
pub mod summary;

pub use persona::{
    PersonaConfig, PersonaConfigBuilder, PersonaDecision, PersonaTrigger, PersonaUpdater,
};
pub use store::{InMemoryUserStore, UserStore};
pub use summary::{InteractionSummary, PurchaseLine, SpendLine, purchases_in_window};
