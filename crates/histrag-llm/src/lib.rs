//! Answer generation: prompt rendering, the chat-completion client and the
//! retrying, grounded answerer that ties them together.

pub mod openai;
pub mod prompt;
pub mod retry;

use async_trait::async_trait;
use tracing::debug;

use histrag_core::config::GenerationSettings;
use histrag_core::error::Result;
use histrag_core::traits::{AnswerGenerator, LanguageModel};

pub use openai::OpenAiChatModel;
pub use prompt::{PromptTemplate, FALLBACK_ANSWER};
pub use retry::RetryPolicy;

/// Asks a language model to answer strictly from the supplied context.
pub struct GroundedAnswerer<M> {
    model: M,
    template: PromptTemplate,
    retry: RetryPolicy,
}

impl<M: LanguageModel> GroundedAnswerer<M> {
    pub fn new(model: M, template: PromptTemplate, retry: RetryPolicy) -> Self {
        Self { model, template, retry }
    }
}

impl GroundedAnswerer<OpenAiChatModel> {
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        Ok(Self::new(
            OpenAiChatModel::from_settings(settings)?,
            PromptTemplate::new(settings.persona.clone()),
            RetryPolicy::from_settings(&settings.retry),
        ))
    }
}

#[async_trait]
impl<M: LanguageModel> AnswerGenerator for GroundedAnswerer<M> {
    async fn ask(&self, context: &str, question: &str) -> Result<String> {
        let prompt = self.template.render(context, question);
        debug!(model = self.model.name(), context_len = context.len(), "asking language model");
        let reply = self.retry.run(|| self.model.complete(&prompt)).await?;
        Ok(reply.trim().to_string())
    }
}
