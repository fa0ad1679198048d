//! FCM notification fan-out library
//!
//! Turns one logical [`Notification`] into per-platform (web, iOS, Android)
//! Firebase Cloud Messaging payloads, submits them for up to 500 recipients
//! in a single batch and reports which recipient tokens are no longer
//! registered.
//!
//! It handles:
//! - Platform payload building for Webpush, APNs and Android
//! - Single and batch delivery through a [`MessagingProvider`]
//! - Triage of per-recipient failures into "unregistered" versus fatal
//! - An FCM HTTP v1 provider with OAuth2 service account tokens
//!
//! # Example
//!
//! ```no_run
//! use fcm_dispatch::{FcmClient, FcmConfig, Notification, NotificationDispatcher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FcmConfig::from_env()?;
//!     let client = FcmClient::from_config(&config)?;
//!     let dispatcher = NotificationDispatcher::new(Arc::new(client));
//!
//!     let notification = Notification::new("Hello client", "This is a specific notification.")
//!         .with_app_id("abcd-1234")
//!         .with_channel_id("1234")
//!         .with_message("Hello");
//!
//!     let tokens = vec!["tokA".to_string(), "tokB".to_string()];
//!     let invalid_tokens = dispatcher.send_batch(&notification, &tokens).await?;
//!     println!("prune: {:?}", invalid_tokens);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod message;
pub mod notification;
pub mod payload;
pub mod provider;

pub use client::{FcmClient, ServiceAccountKey, ServiceAccountTokenSource, StaticToken, TokenSource};
pub use config::FcmConfig;
pub use dispatcher::{NotificationDispatcher, MAX_BATCH_SIZE};
pub use errors::{DeliveryFailure, DispatchError, FcmError, FcmErrorCode, PayloadError, ProviderError};
pub use message::{
    AndroidConfig, ApnsConfig, ApnsPayload, Aps, BatchResponse, Message, SendResponse,
    WebpushConfig,
};
pub use notification::Notification;
pub use payload::{build_message, AndroidPayload, IosPayload, PayloadBuilder, WebPayload};
pub use provider::MessagingProvider;
