use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// FCM v1 error codes reported in `google.firebase.fcm.v1.FcmError` details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FcmErrorCode {
    UnspecifiedError,
    InvalidArgument,
    Unregistered,
    SenderIdMismatch,
    QuotaExceeded,
    Unavailable,
    Internal,
    ThirdPartyAuthError,
}

impl FcmErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FcmErrorCode::UnspecifiedError => "UNSPECIFIED_ERROR",
            FcmErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            FcmErrorCode::Unregistered => "UNREGISTERED",
            FcmErrorCode::SenderIdMismatch => "SENDER_ID_MISMATCH",
            FcmErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            FcmErrorCode::Unavailable => "UNAVAILABLE",
            FcmErrorCode::Internal => "INTERNAL",
            FcmErrorCode::ThirdPartyAuthError => "THIRD_PARTY_AUTH_ERROR",
        }
    }

    /// Parse an FCM `errorCode`; unknown values map to `UnspecifiedError`
    pub fn from_code(s: &str) -> Self {
        match s {
            "INVALID_ARGUMENT" => FcmErrorCode::InvalidArgument,
            "UNREGISTERED" => FcmErrorCode::Unregistered,
            "SENDER_ID_MISMATCH" => FcmErrorCode::SenderIdMismatch,
            "QUOTA_EXCEEDED" => FcmErrorCode::QuotaExceeded,
            "UNAVAILABLE" => FcmErrorCode::Unavailable,
            "INTERNAL" => FcmErrorCode::Internal,
            "THIRD_PARTY_AUTH_ERROR" => FcmErrorCode::ThirdPartyAuthError,
            _ => FcmErrorCode::UnspecifiedError,
        }
    }

    /// Fallback classification when the error body carries no FCM detail
    ///
    /// Never yields `Unregistered`: a bare 404 may come from a wrong project
    /// id or endpoint, so only the detail's `UNREGISTERED` code marks a token.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => FcmErrorCode::InvalidArgument,
            401 | 403 => FcmErrorCode::ThirdPartyAuthError,
            429 => FcmErrorCode::QuotaExceeded,
            500 => FcmErrorCode::Internal,
            503 => FcmErrorCode::Unavailable,
            _ => FcmErrorCode::UnspecifiedError,
        }
    }
}

impl fmt::Display for FcmErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned across the messaging provider boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("FCM API error: {status} {code} - {message}")]
    Api {
        status: u16,
        code: FcmErrorCode,
        message: String,
    },

    #[error("FCM send request failed: {0}")]
    SendRequest(String),

    #[error("Failed to parse FCM response: {0}")]
    ResponseParse(String),

    #[error("Failed to get access token: {0}")]
    Token(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
}

impl ProviderError {
    /// True when the provider reports the recipient token as no longer registered
    pub fn is_unregistered(&self) -> bool {
        matches!(
            self,
            ProviderError::Api {
                code: FcmErrorCode::Unregistered,
                ..
            }
        )
    }

    pub fn code(&self) -> Option<FcmErrorCode> {
        match self {
            ProviderError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Platform payload encoding failure
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Failed to encode {platform} payload: {source}")]
    Serialization {
        platform: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A batch outcome that is neither success nor "unregistered".
///
/// `invalid_tokens` holds the tokens classified as unregistered before the
/// failing recipient, in input order.
#[derive(Error, Debug, Clone)]
#[error("Delivery failed at position {index}: {source}")]
pub struct DeliveryFailure {
    pub token: String,
    pub index: usize,
    #[source]
    pub source: ProviderError,
    pub invalid_tokens: Vec<String>,
}

/// Dispatcher error taxonomy
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Too many tokens: {count} exceeds the batch limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("Empty device token at position {index}")]
    EmptyToken { index: usize },

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Delivery(#[from] DeliveryFailure),
}

impl DispatchError {
    /// Unregistered tokens classified before the error occurred
    pub fn invalid_tokens(&self) -> &[String] {
        match self {
            DispatchError::Delivery(failure) => &failure.invalid_tokens,
            _ => &[],
        }
    }

    /// True when nothing was sent to the provider
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DispatchError::BatchTooLarge { .. }
                | DispatchError::EmptyToken { .. }
                | DispatchError::Payload(_)
        )
    }
}

/// FCM client setup errors
#[derive(Error, Debug)]
pub enum FcmError {
    #[error("Failed to read credentials file {path}: {source}")]
    CredentialsRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse credentials: {0}")]
    CredentialsParse(String),

    #[error("Failed to parse private key: {0}")]
    KeyParseError(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
