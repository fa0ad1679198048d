use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::FcmError;
use crate::payload::DEFAULT_APNS_COLLAPSE_ID;

/// FCM Configuration
#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub credentials_file: PathBuf,
    /// Overrides the project id found in the credentials file
    pub project_id: Option<String>,
    pub endpoint: String,
    pub request_timeout: Duration,
    pub apns_collapse_id: String,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            project_id: None,
            endpoint: "https://fcm.googleapis.com".to_string(),
            request_timeout: Duration::from_secs(10),
            apns_collapse_id: DEFAULT_APNS_COLLAPSE_ID.to_string(),
        }
    }
}

impl FcmConfig {
    /// Loads FCM config from environment variables
    pub fn from_env() -> Result<Self, FcmError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, FcmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let request_timeout = match lookup("FCM_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    FcmError::Config(format!(
                        "FCM_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                        raw
                    ))
                })?;
                if secs == 0 {
                    return Err(FcmError::Config(
                        "FCM_REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        Ok(Self {
            credentials_file: lookup("FCM_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_file),
            project_id: lookup("FCM_PROJECT_ID").filter(|id| !id.trim().is_empty()),
            endpoint: lookup("FCM_ENDPOINT")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoint),
            request_timeout,
            apns_collapse_id: lookup("FCM_APNS_COLLAPSE_ID").unwrap_or(defaults.apns_collapse_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = FcmConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.credentials_file, PathBuf::from("credentials.json"));
        assert_eq!(config.project_id, None);
        assert_eq!(config.endpoint, "https://fcm.googleapis.com");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.apns_collapse_id, "123");
    }

    #[test]
    fn test_overrides() {
        let config = FcmConfig::from_lookup(lookup_from(&[
            ("FCM_CREDENTIALS_FILE", "/etc/fcm/sa.json"),
            ("FCM_PROJECT_ID", "nova-prod"),
            ("FCM_ENDPOINT", "http://localhost:8080/"),
            ("FCM_REQUEST_TIMEOUT_SECS", "3"),
            ("FCM_APNS_COLLAPSE_ID", "chat"),
        ]))
        .unwrap();

        assert_eq!(config.credentials_file, PathBuf::from("/etc/fcm/sa.json"));
        assert_eq!(config.project_id.as_deref(), Some("nova-prod"));
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.apns_collapse_id, "chat");
    }

    #[test]
    fn test_invalid_timeout() {
        let err = FcmConfig::from_lookup(lookup_from(&[("FCM_REQUEST_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, FcmError::Config(_)));

        let err = FcmConfig::from_lookup(lookup_from(&[("FCM_REQUEST_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, FcmError::Config(_)));
    }

    #[test]
    fn test_blank_project_id_is_ignored() {
        let config = FcmConfig::from_lookup(lookup_from(&[("FCM_PROJECT_ID", "  ")])).unwrap();
        assert_eq!(config.project_id, None);
    }
}
