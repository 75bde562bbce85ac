//! Clients for the email and SMS notification endpoints.
//!
//! Both are fire-and-forget batch jobs: one request, one success/failure
//! response, no retry semantics. Recipient groups are resolved remotely; this
//! client never substitutes a fallback address.

use farmline_shared::{ApiError, EmailRequest, SendOutcome, SmsRequest};

use crate::api_client::ApiClient;

/// Client for the deployed send-email and send-sms functions.
#[derive(Debug, Clone)]
pub struct NotifyClient {
    api: ApiClient,
    email_url: String,
    sms_url: String,
}

impl NotifyClient {
    /// `email_url` and `sms_url` are the full endpoint URLs of the deployed
    /// functions.
    pub fn new(email_url: impl Into<String>, sms_url: impl Into<String>) -> Self {
        Self {
            api: ApiClient::default(),
            email_url: email_url.into(),
            sms_url: sms_url.into(),
        }
    }

    /// Submit an email send job.
    pub async fn send_email(&self, request: &EmailRequest) -> Result<SendOutcome, ApiError> {
        self.api.post_json(&self.email_url, request).await
    }

    /// Submit an SMS send job.
    pub async fn send_sms(&self, request: &SmsRequest) -> Result<SendOutcome, ApiError> {
        self.api.post_json(&self.sms_url, request).await
    }
}
