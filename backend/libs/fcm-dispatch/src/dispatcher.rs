//! Notification Dispatcher
//!
//! Builds one outbound message per recipient, submits single or batch sends
//! to a [`MessagingProvider`] and reduces batch outcomes into the list of
//! tokens the caller should prune.
//!
//! Features:
//! - Batch sending up to the provider ceiling of 500 recipients
//! - Validation before any network call (empty tokens, oversized batches)
//! - Unregistered tokens returned as data, in input order
//! - Any other per-recipient failure returned as a typed error that keeps
//!   the tokens classified so far
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::errors::{DeliveryFailure, DispatchError, ProviderError};
use crate::message::{BatchResponse, Message};
use crate::notification::Notification;
use crate::payload::{build_message_with, IosPayload};
use crate::provider::MessagingProvider;

/// Hard batch ceiling imposed by FCM
pub const MAX_BATCH_SIZE: usize = 500;

/// Log only a token prefix
fn token_prefix(token: &str) -> String {
    token.chars().take(8).collect()
}

/// Fans a notification out to device tokens through a messaging provider
#[derive(Clone)]
pub struct NotificationDispatcher {
    provider: Arc<dyn MessagingProvider>,
    ios: IosPayload,
}

impl NotificationDispatcher {
    /// Create a dispatcher with the default APNs collapse id
    pub fn new(provider: Arc<dyn MessagingProvider>) -> Self {
        Self {
            provider,
            ios: IosPayload::default(),
        }
    }

    /// Use a fixed APNs collapse id other than the default
    pub fn with_collapse_id(mut self, collapse_id: impl Into<String>) -> Self {
        self.ios = IosPayload::new(collapse_id);
        self
    }

    fn build(&self, notification: &Notification, token: &str) -> Result<Message, DispatchError> {
        Ok(build_message_with(&self.ios, notification, token)?)
    }

    /// Send a notification to a single device
    ///
    /// # Returns
    /// The provider message id. Provider failures are returned unchanged in
    /// [`DispatchError::Provider`], with no classification or retry.
    pub async fn send(&self, notification: &Notification, token: &str) -> Result<String, DispatchError> {
        if token.is_empty() {
            return Err(DispatchError::EmptyToken { index: 0 });
        }

        let message = self.build(notification, token)?;

        match self.provider.send(&message).await {
            Ok(message_id) => {
                info!(
                    "FCM notification sent to token {} (message_id: {})",
                    token_prefix(token),
                    message_id
                );
                Ok(message_id)
            }
            Err(e) => {
                error!("FCM send failed for token {}: {}", token_prefix(token), e);
                Err(DispatchError::Provider(e))
            }
        }
    }

    /// Send a notification to up to [`MAX_BATCH_SIZE`] devices in one batch
    ///
    /// # Returns
    /// The tokens the provider reports as unregistered, in input order. A
    /// per-recipient failure of any other kind stops classification and is
    /// returned as [`DispatchError::Delivery`], which still carries the
    /// unregistered tokens found before it.
    pub async fn send_batch(
        &self,
        notification: &Notification,
        tokens: &[String],
    ) -> Result<Vec<String>, DispatchError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        if tokens.len() > MAX_BATCH_SIZE {
            return Err(DispatchError::BatchTooLarge {
                count: tokens.len(),
                limit: MAX_BATCH_SIZE,
            });
        }
        if let Some(index) = tokens.iter().position(|t| t.is_empty()) {
            return Err(DispatchError::EmptyToken { index });
        }

        let messages = tokens
            .iter()
            .map(|token| self.build(notification, token))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Sending FCM notification to {} devices in batch", messages.len());

        let batch = self.provider.send_each(&messages).await.map_err(|e| {
            error!("FCM batch send failed: {}", e);
            DispatchError::Provider(e)
        })?;

        if batch.responses.len() != tokens.len() {
            return Err(DispatchError::Provider(ProviderError::ResponseParse(format!(
                "expected {} batch responses, got {}",
                tokens.len(),
                batch.responses.len()
            ))));
        }

        let invalid_tokens = classify(tokens, batch)?;

        info!(
            "Batch send complete: {} devices, {} unregistered",
            tokens.len(),
            invalid_tokens.len()
        );

        Ok(invalid_tokens)
    }
}

/// Reduce batch outcomes to unregistered tokens, stopping at the first fatal failure
fn classify(tokens: &[String], batch: BatchResponse) -> Result<Vec<String>, DeliveryFailure> {
    let mut invalid_tokens = Vec::new();

    for (index, (token, response)) in tokens.iter().zip(batch.responses).enumerate() {
        if response.success {
            continue;
        }

        let error = response.error.unwrap_or_else(|| {
            ProviderError::ResponseParse("failed response without an error".to_string())
        });

        if error.is_unregistered() {
            warn!("FCM token {} is unregistered", token_prefix(token));
            invalid_tokens.push(token.clone());
            continue;
        }

        error!(
            "FCM delivery to token {} failed, aborting batch classification: {}",
            token_prefix(token),
            error
        );
        return Err(DeliveryFailure {
            token: token.clone(),
            index,
            source: error,
            invalid_tokens,
        });
    }

    debug!("Classified {} batch responses", tokens.len());
    Ok(invalid_tokens)
}
