pub mod budget;
pub mod client;
pub mod gates;
pub mod parser;
pub mod prompt;
pub mod schema;

pub use budget::TokenBudget;
pub use client::{HttpLlmClient, LlmClient, MockLlmClient, TokenUsage};
pub use parser::LlmParser;
