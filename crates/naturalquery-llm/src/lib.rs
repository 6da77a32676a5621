//! Language model clients
//!
//! Every backend is reached through the [`PromptClient`] capability: send a
//! role-tagged [`Conversation`](naturalquery_core::Conversation), get the reply
//! text back. Provider specifics (endpoint, payload shape, auth) stay behind
//! the trait.
//!
//! - [`OpenAiCompatClient`] - OpenAI, Anyscale and any compatible endpoint
//! - [`CohereClient`] - Cohere chat
//! - [`MockPromptClient`] - scripted replies for tests

pub mod client;
pub mod cohere;
pub mod factory;
pub mod mock;
pub mod openai;

pub use client::{PromptClient, PromptFailure};
pub use cohere::CohereClient;
pub use factory::client_from_config;
pub use mock::MockPromptClient;
pub use openai::OpenAiCompatClient;
