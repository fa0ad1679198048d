//! Platform payload builders
//!
//! Each builder turns a [`Notification`] (and the recipient token, where the
//! platform echoes it) into that platform's config block. Builders are pure:
//! identical input always serializes to identical bytes, since every map they
//! emit is ordered.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Map;

use crate::errors::PayloadError;
use crate::message::{AndroidConfig, ApnsConfig, ApnsPayload, Aps, Message, WebpushConfig};
use crate::notification::Notification;

/// APNs header the provider uses to replace earlier notifications
pub const APNS_COLLAPSE_HEADER: &str = "apns-collapse-id";

/// Collapse id sent when none is configured
pub const DEFAULT_APNS_COLLAPSE_ID: &str = "123";

/// Produce a platform-specific config from a notification
pub trait PayloadBuilder {
    type Config: Serialize;

    fn build(&self, notification: &Notification, token: &str) -> Result<Self::Config, PayloadError>;
}

#[derive(Serialize)]
struct TitleBody<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct AndroidEcho<'a> {
    token: &'a str,
    notification: TitleBody<'a>,
}

fn to_json_string<T: Serialize>(platform: &'static str, value: &T) -> Result<String, PayloadError> {
    serde_json::to_string(value).map_err(|source| PayloadError::Serialization { platform, source })
}

/// `message` and `data` string fields shared by the web and Android shapes
fn data_fields<T: Serialize>(
    platform: &'static str,
    message: &T,
    notification: &Notification,
) -> Result<BTreeMap<String, String>, PayloadError> {
    Ok(BTreeMap::from([
        ("message".to_string(), to_json_string(platform, message)?),
        ("data".to_string(), to_json_string(platform, notification)?),
    ]))
}

/// Web clients render from `message` and read the full notification from `data`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebPayload;

impl PayloadBuilder for WebPayload {
    type Config = WebpushConfig;

    fn build(&self, notification: &Notification, _token: &str) -> Result<WebpushConfig, PayloadError> {
        let message = TitleBody {
            title: &notification.title,
            body: &notification.body,
        };

        Ok(WebpushConfig {
            data: data_fields("webpush", &message, notification)?,
        })
    }
}

/// APNs alert with the body text, full notification under custom `data`
#[derive(Debug, Clone)]
pub struct IosPayload {
    collapse_id: String,
}

impl IosPayload {
    pub fn new(collapse_id: impl Into<String>) -> Self {
        Self {
            collapse_id: collapse_id.into(),
        }
    }

    pub fn collapse_id(&self) -> &str {
        &self.collapse_id
    }
}

impl Default for IosPayload {
    fn default() -> Self {
        Self::new(DEFAULT_APNS_COLLAPSE_ID)
    }
}

impl PayloadBuilder for IosPayload {
    type Config = ApnsConfig;

    fn build(&self, notification: &Notification, _token: &str) -> Result<ApnsConfig, PayloadError> {
        let data = serde_json::to_value(notification).map_err(|source| {
            PayloadError::Serialization {
                platform: "apns",
                source,
            }
        })?;

        let mut custom_data = Map::new();
        custom_data.insert("data".to_string(), data);

        Ok(ApnsConfig {
            headers: BTreeMap::from([(APNS_COLLAPSE_HEADER.to_string(), self.collapse_id.clone())]),
            payload: ApnsPayload {
                aps: Aps {
                    alert: notification.body.clone(),
                },
                custom_data,
            },
        })
    }
}

/// Data-only Android payload; `message` echoes the recipient token
#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidPayload;

impl PayloadBuilder for AndroidPayload {
    type Config = AndroidConfig;

    fn build(&self, notification: &Notification, token: &str) -> Result<AndroidConfig, PayloadError> {
        let message = AndroidEcho {
            token,
            notification: TitleBody {
                title: &notification.title,
                body: &notification.body,
            },
        };

        Ok(AndroidConfig {
            data: data_fields("android", &message, notification)?,
        })
    }
}

/// Assemble the outbound message for one recipient with the default collapse id
pub fn build_message(notification: &Notification, token: &str) -> Result<Message, PayloadError> {
    build_message_with(&IosPayload::default(), notification, token)
}

pub(crate) fn build_message_with(
    ios: &IosPayload,
    notification: &Notification,
    token: &str,
) -> Result<Message, PayloadError> {
    Ok(Message {
        token: token.to_string(),
        webpush: Some(WebPayload.build(notification, token)?),
        apns: Some(ios.build(notification, token)?),
        android: Some(AndroidPayload.build(notification, token)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample() -> Notification {
        Notification::new("Hello client", "This is a specific notification.")
            .with_app_id("abcd-1234")
            .with_channel_id("1234")
            .with_message("Hello")
    }

    fn decode(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_web_payload_fields() {
        let config = WebPayload.build(&sample(), "tokA").unwrap();

        assert_eq!(
            decode(&config.data["message"]),
            json!({"title": "Hello client", "body": "This is a specific notification."})
        );
        let embedded: Notification = serde_json::from_str(&config.data["data"]).unwrap();
        assert_eq!(embedded, sample());
        assert_eq!(config.data.len(), 2);
    }

    #[test]
    fn test_android_payload_echoes_token() {
        let config = AndroidPayload.build(&sample(), "tokB").unwrap();

        assert_eq!(
            decode(&config.data["message"]),
            json!({
                "token": "tokB",
                "notification": {"title": "Hello client", "body": "This is a specific notification."}
            })
        );
        let embedded: Notification = serde_json::from_str(&config.data["data"]).unwrap();
        assert_eq!(embedded, sample());
    }

    #[test]
    fn test_ios_payload_alert_and_collapse_header() {
        let config = IosPayload::default().build(&sample(), "tokA").unwrap();

        assert_eq!(config.payload.aps.alert, "This is a specific notification.");
        assert_eq!(config.headers[APNS_COLLAPSE_HEADER], DEFAULT_APNS_COLLAPSE_ID);
        assert_eq!(
            config.payload.custom_data["data"],
            serde_json::to_value(sample()).unwrap()
        );
    }

    #[test]
    fn test_ios_payload_custom_collapse_id() {
        let config = IosPayload::new("chat-42").build(&sample(), "tokA").unwrap();
        assert_eq!(config.headers[APNS_COLLAPSE_HEADER], "chat-42");
    }

    #[test]
    fn test_builders_are_deterministic() {
        let mut data = Map::new();
        data.insert("z".to_string(), json!(1));
        data.insert("a".to_string(), json!({"y": 2, "b": 3}));
        let notification = sample().with_data(data);

        let first = serde_json::to_vec(&build_message(&notification, "tokA").unwrap()).unwrap();
        let second = serde_json::to_vec(&build_message(&notification, "tokA").unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_message_differs_only_by_token() {
        let a = build_message(&sample(), "tokA").unwrap();
        let b = build_message(&sample(), "tokB").unwrap();

        assert_eq!(a.token, "tokA");
        assert_eq!(a.webpush, b.webpush);
        assert_eq!(a.apns, b.apns);
        assert_ne!(a.android, b.android);
    }
}
