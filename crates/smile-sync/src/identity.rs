//! Anonymous identity bootstrap.
//!
//! The backend issues an opaque anonymous credential used solely to
//! authorize reads and writes of the shared portfolio document. It is
//! requested once per process lifetime and never explicitly destroyed.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::RemoteConfig;

/// An anonymous session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Backend-assigned user id.
    pub uid: String,
    /// Bearer token presented on document reads and writes.
    pub token: String,
}

/// Classified identity bootstrap failures.
///
/// The three recognized backend conditions carry fixed remediation messages
/// shown verbatim in the admin banner; anything else keeps the backend's raw
/// message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Auth not enabled. Go to Firebase Console -> Authentication -> Get Started.")]
    AuthNotEnabled,

    #[error("Anonymous Auth not enabled. Go to Firebase Console -> Authentication -> Sign-in method.")]
    AnonymousAuthNotEnabled,

    #[error("Domain not authorized. Go to Firebase Console -> Authentication -> Settings -> Authorized Domains.")]
    DomainNotAuthorized,

    #[error("{0}")]
    Backend(String),
}

impl IdentityError {
    /// Classify a backend failure by its code and message.
    ///
    /// Matching is case-insensitive and tolerant of `_` vs `-` separators,
    /// since the REST surface reports `OPERATION_NOT_ALLOWED` where the SDK
    /// surface reports `auth/operation-not-allowed`.
    pub fn classify(code: &str, message: &str) -> Self {
        let normalized = format!("{} {}", code, message)
            .to_ascii_lowercase()
            .replace('_', "-");

        if normalized.contains("configuration-not-found") {
            IdentityError::AuthNotEnabled
        } else if normalized.contains("operation-not-allowed") {
            IdentityError::AnonymousAuthNotEnabled
        } else if normalized.contains("unauthorized-domain") {
            IdentityError::DomainNotAuthorized
        } else {
            IdentityError::Backend(message.to_string())
        }
    }
}

/// The remote identity service: one operation, "sign in anonymously".
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError>;
}

/// Identity service backed by the Identity Toolkit REST API.
///
/// An anonymous sign-in is a credential-less `accounts:signUp` request; the
/// response carries the session token and the assigned uid.
pub struct RestIdentityService {
    http: reqwest::Client,
    endpoint: String,
}

impl RestIdentityService {
    const SIGN_UP_URL: &'static str = "https://identitytoolkit.googleapis.com/v1/accounts:signUp";

    pub fn new(config: &RemoteConfig) -> Self {
        Self::with_endpoint(config, Self::SIGN_UP_URL)
    }

    /// Point the service at a non-default endpoint (local emulators).
    pub fn with_endpoint(config: &RemoteConfig, base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}?key={}", base, config.api_key),
        }
    }
}

#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(rename = "idToken")]
    id_token: String,
    #[serde(rename = "localId")]
    local_id: String,
}

#[derive(Deserialize)]
struct BackendError {
    error: BackendErrorBody,
}

#[derive(Deserialize)]
struct BackendErrorBody {
    message: String,
}

#[async_trait]
impl IdentityService for RestIdentityService {
    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?;

        if response.status().is_success() {
            let body: SignUpResponse = response
                .json()
                .await
                .map_err(|e| IdentityError::Backend(e.to_string()))?;
            return Ok(Identity {
                uid: body.local_id,
                token: body.id_token,
            });
        }

        let status = response.status();
        match response.json::<BackendError>().await {
            Ok(body) => Err(IdentityError::classify("", &body.error.message)),
            Err(_) => Err(IdentityError::Backend(format!(
                "sign-in failed with status {status}"
            ))),
        }
    }
}

/// Identity service with a fixed outcome, for tests and local demos.
pub struct StaticIdentityService {
    outcome: Result<Identity, IdentityError>,
}

impl StaticIdentityService {
    /// Always signs in as the given uid.
    pub fn signed_in(uid: impl Into<String>) -> Self {
        let uid = uid.into();
        Self {
            outcome: Ok(Identity {
                token: format!("token-{uid}"),
                uid,
            }),
        }
    }

    /// Always fails with the given error.
    pub fn failing(error: IdentityError) -> Self {
        Self {
            outcome: Err(error),
        }
    }
}

#[async_trait]
impl IdentityService for StaticIdentityService {
    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError> {
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_sdk_style_codes() {
        assert_eq!(
            IdentityError::classify("auth/configuration-not-found", "config missing"),
            IdentityError::AuthNotEnabled
        );
        assert_eq!(
            IdentityError::classify("auth/operation-not-allowed", ""),
            IdentityError::AnonymousAuthNotEnabled
        );
        assert_eq!(
            IdentityError::classify("auth/unauthorized-domain", ""),
            IdentityError::DomainNotAuthorized
        );
    }

    #[test]
    fn classify_rest_style_messages() {
        assert_eq!(
            IdentityError::classify("", "OPERATION_NOT_ALLOWED"),
            IdentityError::AnonymousAuthNotEnabled
        );
        assert_eq!(
            IdentityError::classify("", "CONFIGURATION_NOT_FOUND"),
            IdentityError::AuthNotEnabled
        );
    }

    #[test]
    fn unrecognized_failures_keep_their_message() {
        let err = IdentityError::classify("auth/network-request-failed", "network down");
        assert_eq!(err, IdentityError::Backend("network down".into()));
        assert_eq!(err.to_string(), "network down");
    }

    #[test]
    fn canonical_remediation_strings() {
        assert_eq!(
            IdentityError::AnonymousAuthNotEnabled.to_string(),
            "Anonymous Auth not enabled. Go to Firebase Console -> Authentication -> Sign-in method."
        );
        assert_eq!(
            IdentityError::AuthNotEnabled.to_string(),
            "Auth not enabled. Go to Firebase Console -> Authentication -> Get Started."
        );
        assert_eq!(
            IdentityError::DomainNotAuthorized.to_string(),
            "Domain not authorized. Go to Firebase Console -> Authentication -> Settings -> Authorized Domains."
        );
    }

    #[tokio::test]
    async fn static_service_outcomes() {
        let ok = StaticIdentityService::signed_in("anon-1");
        assert_eq!(ok.sign_in_anonymously().await.unwrap().uid, "anon-1");

        let err = StaticIdentityService::failing(IdentityError::AnonymousAuthNotEnabled);
        assert_eq!(
            err.sign_in_anonymously().await.unwrap_err(),
            IdentityError::AnonymousAuthNotEnabled
        );
    }
}
