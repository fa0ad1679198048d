use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use fcm_dispatch::{
    DispatchError, FcmClient, FcmConfig, Notification, NotificationDispatcher, MAX_BATCH_SIZE,
};
use serde_json::json;
use tracing::{error, info};

mod logging;

const USAGE: &str = "usage: fcm-push <notification.json> <token>...";

fn load_notification(path: &Path) -> Result<Notification> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read notification file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse notification file {}", path.display()))
}

/// Result of sending to every chunk of a token list
#[derive(Debug)]
struct DispatchOutcome {
    /// Unregistered tokens from every chunk classified before any failure
    invalid_tokens: Vec<String>,
    error: Option<DispatchError>,
}

/// Send to every token, splitting into provider-sized batches
///
/// Stops at the first failing chunk. Tokens found in earlier chunks are kept
/// whatever the failure, and delivery failure positions refer to `tokens`.
async fn dispatch_all(
    dispatcher: &NotificationDispatcher,
    notification: &Notification,
    tokens: &[String],
) -> DispatchOutcome {
    let mut invalid_tokens = Vec::new();
    for (chunk_index, chunk) in tokens.chunks(MAX_BATCH_SIZE).enumerate() {
        let offset = chunk_index * MAX_BATCH_SIZE;
        let error = match dispatcher.send_batch(notification, chunk).await {
            Ok(mut invalid) => {
                invalid_tokens.append(&mut invalid);
                continue;
            }
            Err(DispatchError::Delivery(mut failure)) => {
                invalid_tokens.append(&mut failure.invalid_tokens);
                failure.invalid_tokens = invalid_tokens.clone();
                failure.index += offset;
                DispatchError::Delivery(failure)
            }
            Err(DispatchError::EmptyToken { index }) => DispatchError::EmptyToken {
                index: index + offset,
            },
            Err(e) => e,
        };
        return DispatchOutcome {
            invalid_tokens,
            error: Some(error),
        };
    }
    DispatchOutcome {
        invalid_tokens,
        error: None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let (notification_path, tokens) = match args.split_first() {
        Some((path, tokens)) if !tokens.is_empty() => (path, tokens),
        _ => bail!(USAGE),
    };

    let notification = load_notification(Path::new(notification_path))?;

    let config = FcmConfig::from_env().context("Failed to load FCM configuration")?;
    let client = FcmClient::from_config(&config).context("Failed to initialize FCM client")?;
    let dispatcher =
        NotificationDispatcher::new(Arc::new(client)).with_collapse_id(config.apns_collapse_id.clone());

    info!("Dispatching notification to {} device(s)", tokens.len());

    if let [token] = tokens {
        let message_id = dispatcher
            .send(&notification, token)
            .await
            .context("FCM send failed")?;
        println!("{}", json!({ "message_id": message_id }));
        return Ok(());
    }

    let outcome = dispatch_all(&dispatcher, &notification, tokens).await;
    if outcome.error.is_none() || !outcome.invalid_tokens.is_empty() {
        println!("{}", json!({ "invalid_tokens": outcome.invalid_tokens }));
    }

    match outcome.error {
        None => Ok(()),
        Some(e) => {
            error!("Dispatch aborted: {}", e);
            Err(anyhow::Error::new(e).context("FCM batch dispatch failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcm_dispatch::{
        BatchResponse, FcmErrorCode, Message, MessagingProvider, ProviderError, SendResponse,
    };

    /// Reports tokens ending in "-dead" as unregistered and "-boom" as internal
    /// errors. A batch containing a "-reset" token fails as a whole.
    struct ScriptedProvider;

    #[async_trait::async_trait]
    impl MessagingProvider for ScriptedProvider {
        async fn send(&self, _message: &Message) -> Result<String, ProviderError> {
            Ok("projects/p/messages/1".to_string())
        }

        async fn send_each(&self, messages: &[Message]) -> Result<BatchResponse, ProviderError> {
            if messages.iter().any(|m| m.token.ends_with("-reset")) {
                return Err(ProviderError::SendRequest("connection reset".to_string()));
            }
            Ok(BatchResponse::new(
                messages
                    .iter()
                    .map(|m| {
                        let code = if m.token.ends_with("-dead") {
                            FcmErrorCode::Unregistered
                        } else if m.token.ends_with("-boom") {
                            FcmErrorCode::Internal
                        } else {
                            return SendResponse::success("ok");
                        };
                        SendResponse::failure(ProviderError::Api {
                            status: 500,
                            code,
                            message: code.to_string(),
                        })
                    })
                    .collect(),
            ))
        }
    }

    #[test]
    fn test_load_notification_sample() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("notification.sample.json");
        let notification = load_notification(&path).unwrap();

        assert_eq!(notification.title, "Hello client");
        assert_eq!(notification.kind, "text");
        assert!(notification.data.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_all_merges_chunks() {
        let dispatcher = NotificationDispatcher::new(Arc::new(ScriptedProvider));
        let tokens: Vec<String> = (0..1200)
            .map(|i| {
                if i % 400 == 7 {
                    format!("t{i}-dead")
                } else {
                    format!("t{i}")
                }
            })
            .collect();

        let outcome = dispatch_all(&dispatcher, &Notification::new("t", "b"), &tokens).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.invalid_tokens, vec!["t7-dead", "t407-dead", "t807-dead"]);
    }

    #[tokio::test]
    async fn test_dispatch_all_keeps_earlier_chunks_on_failure() {
        let dispatcher = NotificationDispatcher::new(Arc::new(ScriptedProvider));
        let mut tokens: Vec<String> = (0..600).map(|i| format!("t{i}")).collect();
        tokens[3] = "t3-dead".to_string();
        tokens[550] = "t550-dead".to_string();
        tokens[560] = "t560-boom".to_string();

        let outcome = dispatch_all(&dispatcher, &Notification::new("t", "b"), &tokens).await;

        assert_eq!(outcome.invalid_tokens, ["t3-dead", "t550-dead"]);
        match outcome.error {
            Some(DispatchError::Delivery(failure)) => {
                assert_eq!(failure.token, "t560-boom");
                assert_eq!(failure.index, 560);
                assert_eq!(failure.invalid_tokens, ["t3-dead", "t550-dead"]);
            }
            other => panic!("expected delivery failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_all_keeps_earlier_chunks_on_provider_error() {
        let dispatcher = NotificationDispatcher::new(Arc::new(ScriptedProvider));
        let mut tokens: Vec<String> = (0..1200).map(|i| format!("t{i}")).collect();
        tokens[3] = "t3-dead".to_string();
        tokens[700] = "t700-reset".to_string();
        tokens[1100] = "t1100-dead".to_string();

        let outcome = dispatch_all(&dispatcher, &Notification::new("t", "b"), &tokens).await;

        assert_eq!(outcome.invalid_tokens, ["t3-dead"]);
        assert!(matches!(
            outcome.error,
            Some(DispatchError::Provider(ProviderError::SendRequest(_)))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_all_offsets_empty_token_position() {
        let dispatcher = NotificationDispatcher::new(Arc::new(ScriptedProvider));
        let mut tokens: Vec<String> = (0..600).map(|i| format!("t{i}")).collect();
        tokens[0] = "t0-dead".to_string();
        tokens[510] = String::new();

        let outcome = dispatch_all(&dispatcher, &Notification::new("t", "b"), &tokens).await;

        assert_eq!(outcome.invalid_tokens, ["t0-dead"]);
        assert!(matches!(
            outcome.error,
            Some(DispatchError::EmptyToken { index: 510 })
        ));
    }
}
