pub mod client;
pub mod prompt;
pub mod responder;

use async_trait::async_trait;

use crate::error::Result;

/// A chat completion backend. Opaque to the rest of the system: it turns a
/// prompt into UTF-8 text that may or may not end in a termination token,
/// which publication strips.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Model identifier, recorded in comment signatures.
    fn model(&self) -> &str;
}
