use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ProviderError;

/// Outbound message for one recipient, in FCM HTTP v1 shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webpush: Option<WebpushConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns: Option<ApnsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidConfig>,
}

/// Webpush config carrying data-only fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebpushConfig {
    pub data: BTreeMap<String, String>,
}

/// APNs config: HTTP/2 headers plus the `aps` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApnsConfig {
    pub headers: BTreeMap<String, String>,
    pub payload: ApnsPayload,
}

/// APNs payload; custom data keys sit next to `aps` at the top level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApnsPayload {
    pub aps: Aps,
    #[serde(flatten)]
    pub custom_data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aps {
    pub alert: String,
}

/// Android config carrying data-only fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AndroidConfig {
    pub data: BTreeMap<String, String>,
}

/// Outcome of delivering one message
#[derive(Debug, Clone, PartialEq)]
pub struct SendResponse {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<ProviderError>,
}

impl SendResponse {
    pub fn success(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failure(error: ProviderError) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error),
        }
    }
}

/// Outcomes of a batch send, in the order the messages were submitted
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse {
    pub responses: Vec<SendResponse>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchResponse {
    pub fn new(responses: Vec<SendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        let failure_count = responses.len() - success_count;
        Self {
            responses,
            success_count,
            failure_count,
        }
    }
}

/// FCM v1 send request envelope
#[derive(Debug, Serialize)]
pub(crate) struct FcmMessage<'a> {
    pub message: &'a Message,
}

/// FCM v1 send success body
#[derive(Debug, Deserialize)]
pub(crate) struct FcmApiResponse {
    pub name: Option<String>,
}

/// FCM v1 error body
#[derive(Debug, Deserialize)]
pub(crate) struct FcmErrorEnvelope {
    pub error: FcmErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FcmErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FcmErrorDetail {
    #[serde(rename = "@type")]
    pub type_url: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: Option<String>,
}
