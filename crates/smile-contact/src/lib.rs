//! smile-contact: contact form relay client for the City Smile site.
//!
//! Appointment requests POST to a third-party form-relay endpoint. This is
//! outside the portfolio reconciliation core and shares none of its state;
//! success or failure is simply reported back to the visitor.

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Fields of the appointment request form, in the relay's wire casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub message: String,
}

/// Contact submission failures.
#[derive(Debug, Error)]
pub enum ContactError {
    /// The relay rejected the submission. Messages come from the relay's
    /// `errors` array when it provides one.
    #[error("Error sending message: {}", messages.join("; "))]
    Rejected { messages: Vec<String> },

    #[error("Network error: {0}")]
    Network(String),
}

/// Client for the form-relay endpoint.
pub struct ContactRelay {
    http: reqwest::Client,
    endpoint: Url,
}

impl ContactRelay {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Submit an appointment request.
    pub async fn submit(&self, form: &ContactForm) -> Result<(), ContactError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| ContactError::Network(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        #[derive(Deserialize)]
        struct RelayErrors {
            #[serde(default)]
            errors: Vec<RelayError>,
        }

        #[derive(Deserialize)]
        struct RelayError {
            message: String,
        }

        let messages = match response.json::<RelayErrors>().await {
            Ok(body) if !body.errors.is_empty() => {
                body.errors.into_iter().map(|e| e.message).collect()
            }
            _ => vec!["Something went wrong".to_string()],
        };
        Err(ContactError::Rejected { messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_serializes_in_relay_casing() {
        let form = ContactForm {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: "asha@example.com".into(),
            message: "Looking for aligners.".into(),
        };
        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["firstName"], "Asha");
        assert_eq!(json["lastName"], "Rao");
        assert!(json.get("first_name").is_none());
    }

    #[test]
    fn rejection_joins_relay_messages() {
        let err = ContactError::Rejected {
            messages: vec!["email is invalid".into(), "message too short".into()],
        };
        assert_eq!(
            err.to_string(),
            "Error sending message: email is invalid; message too short"
        );
    }
}
