use async_trait::async_trait;

pub mod anthropic;
pub mod translate;
pub mod types;
pub use types::*;

/// Trait for chat-completion providers.
/// The dispatcher only needs one call: send the condensed conversation, get one
/// assistant message back.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Request a completion for `messages` using `model`, capped at
    /// `max_tokens` output tokens.
    async fn complete(
        &self,
        model: &str,
        max_tokens: u32,
        messages: &[RequestMessage],
    ) -> Result<ResponseMessage, AiError>;

    /// Provider name for logging/display
    fn name(&self) -> &str;
}

/// Pull the reply text out of a response. The first block must be text.
pub fn extract_reply_text(response: &ResponseMessage) -> Result<String, AiError> {
    match response.content.first() {
        Some(ResponseBlock::Text { text }) => Ok(text.clone()),
        Some(ResponseBlock::Other) => Err(AiError::UnexpectedContent(
            "first content block is not text".into(),
        )),
        None => Err(AiError::UnexpectedContent("response has no content".into())),
    }
}
