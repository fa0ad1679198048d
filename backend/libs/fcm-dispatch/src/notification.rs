use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Logical notification delivered to every recipient of a dispatch.
///
/// The same value is embedded, serialized as JSON, into each platform
/// payload, so field names here are part of what the receiving apps parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub app_id: String,
    pub channel_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Option<Map<String, Value>>,
}

impl Notification {
    /// Create a plain text notification with the given title and body
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            kind: "text".to_string(),
            ..Default::default()
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    pub fn with_channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }
}
