use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::FcmConfig;
use crate::dispatcher::MAX_BATCH_SIZE;
use crate::errors::{FcmError, FcmErrorCode, ProviderError};
use crate::message::{
    BatchResponse, FcmApiResponse, FcmErrorBody, FcmErrorEnvelope, FcmMessage, Message, SendResponse,
};
use crate::provider::MessagingProvider;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const FCM_ERROR_DETAIL_TYPE: &str = "type.googleapis.com/google.firebase.fcm.v1.FcmError";
const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com";

/// Firebase Service Account Key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub auth_uri: String,
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Load a service account key from a JSON credentials file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FcmError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FcmError::CredentialsRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(json: &str) -> Result<Self, FcmError> {
        serde_json::from_str(json).map_err(|e| FcmError::CredentialsParse(e.to_string()))
    }
}

/// OAuth2 Token Cache
#[derive(Debug, Clone)]
struct TokenCache {
    access_token: String,
    expires_at: i64,
}

/// JWT Claims for Google OAuth2
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    sub: String,
    scope: String,
    aud: String,
    exp: i64,
    iat: i64,
}

/// Google OAuth2 Token Response
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Source of OAuth2 bearer tokens for FCM requests
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, ProviderError>;
}

/// Pre-issued access token
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self(access_token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, ProviderError> {
        Ok(self.0.clone())
    }
}

/// Exchanges a signed service account JWT for access tokens, with caching
pub struct ServiceAccountTokenSource {
    credentials: Arc<ServiceAccountKey>,
    encoding_key: EncodingKey,
    token_cache: Mutex<Option<TokenCache>>,
    http_client: reqwest::Client,
}

impl ServiceAccountTokenSource {
    pub fn new(credentials: ServiceAccountKey, http_client: reqwest::Client) -> Result<Self, FcmError> {
        let encoding_key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| FcmError::KeyParseError(e.to_string()))?;

        Ok(Self {
            credentials: Arc::new(credentials),
            encoding_key,
            token_cache: Mutex::new(None),
            http_client,
        })
    }

    fn signed_assertion(&self) -> Result<String, ProviderError> {
        let now = Utc::now();
        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            sub: self.credentials.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        if !self.credentials.private_key_id.is_empty() {
            header.kid = Some(self.credentials.private_key_id.clone());
        }

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| ProviderError::Token(format!("Failed to encode JWT: {}", e)))
    }
}

#[async_trait::async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, ProviderError> {
        // Held across the exchange so concurrent callers share one refresh.
        // The wait is bounded by the http client's request timeout.
        let mut cache = self.token_cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Utc::now().timestamp() + 60 {
                return Ok(cached.access_token.clone());
            }
        }

        let assertion = self.signed_assertion()?;
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.credentials.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Token(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Token(format!(
                "Token request failed with status: {}",
                response.status()
            )));
        }

        let token_response: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Token(format!("Failed to parse token response: {}", e)))?;

        debug!(
            "Refreshed FCM access token for {} (expires in {}s)",
            self.credentials.client_email, token_response.expires_in
        );

        *cache = Some(TokenCache {
            access_token: token_response.access_token.clone(),
            expires_at: Utc::now().timestamp() + token_response.expires_in,
        });

        Ok(token_response.access_token)
    }
}

/// Firebase Cloud Messaging HTTP v1 client
///
/// Holds only immutable state, so one instance can serve concurrent dispatches.
pub struct FcmClient {
    project_id: String,
    endpoint: String,
    token_source: Arc<dyn TokenSource>,
    http_client: reqwest::Client,
}

impl FcmClient {
    /// Create new FCM client
    ///
    /// # Arguments
    /// * `project_id` - Firebase project ID
    /// * `token_source` - Supplies OAuth2 bearer tokens
    pub fn new(project_id: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            project_id: project_id.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_source,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build a client from configuration, loading the service account key file
    pub fn from_config(config: &FcmConfig) -> Result<Self, FcmError> {
        let credentials = ServiceAccountKey::from_file(&config.credentials_file)?;

        let project_id = config
            .project_id
            .clone()
            .unwrap_or_else(|| credentials.project_id.clone());
        if project_id.trim().is_empty() {
            return Err(FcmError::Config(
                "no project id in FCM_PROJECT_ID or the credentials file".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FcmError::HttpClient(e.to_string()))?;

        info!(
            "Initialized FCM client for project_id={}, client_email={}",
            project_id, credentials.client_email
        );

        let token_source = ServiceAccountTokenSource::new(credentials, http_client.clone())?;

        Ok(Self {
            project_id,
            endpoint: config.endpoint.clone(),
            token_source: Arc::new(token_source),
            http_client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        )
    }

    async fn post_message(&self, access_token: &str, message: &Message) -> Result<String, ProviderError> {
        let response = self
            .http_client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&FcmMessage { message })
            .send()
            .await
            .map_err(|e| ProviderError::SendRequest(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: FcmApiResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::ResponseParse(e.to_string()))?;

            return body
                .name
                .ok_or_else(|| ProviderError::ResponseParse("missing message name".to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        Err(parse_error_response(status.as_u16(), &text))
    }
}

/// Map an FCM v1 error body to a [`ProviderError`]
pub(crate) fn parse_error_response(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<FcmErrorEnvelope>(body) {
        Ok(FcmErrorEnvelope {
            error:
                FcmErrorBody {
                    message,
                    status: status_text,
                    details,
                },
        }) => {
            let code = details
                .iter()
                .filter(|d| d.type_url.as_deref() == Some(FCM_ERROR_DETAIL_TYPE))
                .find_map(|d| d.error_code.as_deref())
                .map(FcmErrorCode::from_code)
                .unwrap_or_else(|| FcmErrorCode::from_http_status(status));

            let message = match status_text {
                Some(text) if message.is_empty() => text,
                _ => message,
            };

            ProviderError::Api {
                status,
                code,
                message,
            }
        }
        Err(_) => ProviderError::Api {
            status,
            code: FcmErrorCode::from_http_status(status),
            message: if body.is_empty() {
                "Unknown error".to_string()
            } else {
                body.to_string()
            },
        },
    }
}

#[async_trait::async_trait]
impl MessagingProvider for FcmClient {
    async fn send(&self, message: &Message) -> Result<String, ProviderError> {
        let access_token = self.token_source.access_token().await?;
        self.post_message(&access_token, message).await
    }

    async fn send_each(&self, messages: &[Message]) -> Result<BatchResponse, ProviderError> {
        if messages.is_empty() {
            return Err(ProviderError::InvalidBatch(
                "messages must not be empty".to_string(),
            ));
        }
        if messages.len() > MAX_BATCH_SIZE {
            return Err(ProviderError::InvalidBatch(format!(
                "messages must not contain more than {} elements",
                MAX_BATCH_SIZE
            )));
        }

        let access_token = self.token_source.access_token().await?;

        let outcomes = join_all(
            messages
                .iter()
                .map(|message| self.post_message(&access_token, message)),
        )
        .await;

        let responses: Vec<SendResponse> = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                Ok(message_id) => SendResponse::success(message_id),
                Err(e) => SendResponse::failure(e),
            })
            .collect();

        let batch = BatchResponse::new(responses);
        if batch.failure_count > 0 {
            warn!(
                "FCM batch finished with {} failures out of {}",
                batch.failure_count,
                messages.len()
            );
        } else {
            debug!("FCM batch delivered {} messages", batch.success_count);
        }

        Ok(batch)
    }
}
