use super::models::{AiConfig, ContentPart, ConversationState, Message, TurnOutcome};
use crate::core::drive::KnowledgeBase;
use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends one stateless generation request and returns the model's text.
    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        parts: &[ContentPart],
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

// Blanket implementation for Box<dyn AiProvider>
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        parts: &[ContentPart],
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        (**self).generate(api_key, model, parts).await
    }
}

/// Answers questions from the documents in a knowledge base.
///
/// Every question is sent on its own with the full knowledge base attached;
/// earlier answers are not forwarded to the model.
pub struct AiService<P: AiProvider> {
    provider: P,
    config: AiConfig,
}

impl<P: AiProvider> AiService<P> {
    pub fn new(provider: P, config: AiConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Builds the request: instructions, the question, then one attachment
    /// per document in knowledge-base order.
    pub fn build_parts(&self, question: &str, knowledge_base: &KnowledgeBase) -> Vec<ContentPart> {
        let mut parts = vec![
            ContentPart::text(format!(
                "You are the {}. Polite and helpful to parents.",
                self.config.assistant_name
            )),
            ContentPart::text("Answer based ONLY on the attached documents."),
            ContentPart::text(format!("QUESTION: {}", question)),
        ];

        parts.extend(
            knowledge_base
                .documents()
                .iter()
                .map(|doc| ContentPart::InlineData {
                    mime_type: doc.mime.clone(),
                    data: doc.data.clone(),
                }),
        );

        parts
    }

    /// Processes one question and returns the updated transcript.
    ///
    /// The question is recorded before anything else so it stays visible
    /// even when no answer comes back.
    pub async fn take_turn(
        &self,
        mut state: ConversationState,
        question: &str,
        api_key: Option<&str>,
        knowledge_base: &KnowledgeBase,
    ) -> (ConversationState, TurnOutcome) {
        state.push(Message::user(question));

        let Some(api_key) = api_key.map(str::trim).filter(|k| !k.is_empty()) else {
            tracing::debug!("No API key configured, question left pending");
            return (state, TurnOutcome::MissingApiKey);
        };

        let parts = self.build_parts(question, knowledge_base);
        tracing::debug!(
            "Asking {} with {} attachment(s)",
            self.config.model,
            knowledge_base.len()
        );

        match self
            .provider
            .generate(api_key, &self.config.model, &parts)
            .await
        {
            Ok(answer) => {
                state.push(Message::assistant(answer.clone()));
                (state, TurnOutcome::Answered(answer))
            }
            Err(e) => {
                tracing::error!("AI error: {}", e);
                (state, TurnOutcome::Failed(e.to_string()))
            }
        }
    }
}
