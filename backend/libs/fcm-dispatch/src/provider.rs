use crate::errors::ProviderError;
use crate::message::{BatchResponse, Message};

/// Trait for push messaging providers
#[async_trait::async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Sends one message
    ///
    /// # Returns
    /// The provider-assigned message id, or the provider error unchanged
    async fn send(&self, message: &Message) -> Result<String, ProviderError>;

    /// Sends every message as one batch operation
    ///
    /// # Returns
    /// One outcome per message, in submission order. `Err` means the batch
    /// call itself failed and no per-recipient outcome is available.
    async fn send_each(&self, messages: &[Message]) -> Result<BatchResponse, ProviderError>;
}
