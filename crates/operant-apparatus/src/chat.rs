//! Chat-model backed processor
//!
//! An apparatus may itself call a language model. The provider transport is
//! left to the embedding application, which supplies a [`ChatClient`].

use crate::text::text_var;
use async_trait::async_trait;
use operant_core::error::RegistryError;
use operant_core::foundry::{ProcessFn, Processor};
use operant_core::model::{record, Param, Record, VirtualType};
use std::fmt;
use std::sync::Arc;

/// System prompt used when the alignment does not bind one
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a precise assistant. Answer the request directly, without preamble.";

/// A chat completion provider
#[async_trait]
pub trait ChatClient: Send + Sync + fmt::Debug {
    async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug)]
struct PromptCall {
    client: Arc<dyn ChatClient>,
}

#[async_trait]
impl ProcessFn for PromptCall {
    async fn process(&self, input: Record) -> anyhow::Result<Record> {
        let prompt = text_var(&input, "prompt")?;
        let system = input
            .get("system")
            .and_then(Param::text)
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        tracing::debug!(prompt_len = prompt.len(), client = ?self.client, "Calling chat model");
        let reply = self.client.complete(system, &prompt).await?;

        Ok(record([("text", reply)]))
    }
}

/// The `prompt` processor: sends `prompt` (and an optional `system`) to `client`
pub fn prompt_processor(client: Arc<dyn ChatClient>) -> Result<Processor, RegistryError> {
    Processor::builder()
        .name("prompt")
        .description("Ask a chat model and return its reply")
        .input("prompt", VirtualType::text("user message"))
        .input("system", VirtualType::text("system instructions").optional())
        .output("text", VirtualType::text("model reply"))
        .callable(Arc::new(PromptCall { client }))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replies with the system prompt and the message it was given
    #[derive(Debug)]
    struct Parrot;

    #[async_trait]
    impl ChatClient for Parrot {
        async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
            Ok(format!("[{system}] {prompt}"))
        }
    }

    #[derive(Debug)]
    struct Offline;

    #[async_trait]
    impl ChatClient for Offline {
        async fn complete(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
            anyhow::bail!("provider offline")
        }
    }

    #[tokio::test]
    async fn test_prompt_uses_default_system() {
        let processor = prompt_processor(Arc::new(Parrot)).unwrap();
        let out = processor.process(record([("prompt", "hello")])).await.unwrap();

        let reply = out["text"].text().unwrap();
        assert!(reply.starts_with(&format!("[{DEFAULT_SYSTEM_PROMPT}]")));
        assert!(reply.ends_with("hello"));
    }

    #[tokio::test]
    async fn test_prompt_honours_bound_system() {
        let processor = prompt_processor(Arc::new(Parrot)).unwrap();
        let out = processor
            .process(record([("prompt", "hello"), ("system", "terse")]))
            .await
            .unwrap();

        assert_eq!(out["text"].text(), Some("[terse] hello"));
    }

    #[tokio::test]
    async fn test_client_error_propagates() {
        let processor = prompt_processor(Arc::new(Offline)).unwrap();
        let err = processor
            .process(record([("prompt", "hello")]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("offline"));
    }
}
