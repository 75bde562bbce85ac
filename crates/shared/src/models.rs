//! Data models for the directory and notification services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Directory ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Buyer,
    Farmer,
    Admin,
}

/// A directory entry as returned by `GET /api/users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub user_id: String,
    pub user_type: UserType,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Extended profile record, keyed by user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub profile_id: String,
    pub user_id: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub occupation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Notifications ---

/// Request body for the email-send endpoint.
///
/// `recipient_type` is either `"custom"` (with `custom_email` set) or a group
/// selector such as `"farmers"` or `"buyers"`; resolving a group to concrete
/// addresses is the remote service's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub recipient_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_email: Option<String>,
    pub subject: String,
    pub message: String,
}

impl EmailRequest {
    /// Email to a single explicit address.
    pub fn to_address(
        email: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient_type: "custom".to_string(),
            custom_email: Some(email.into()),
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Email to a named recipient group.
    pub fn to_group(
        group: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient_type: group.into(),
            custom_email: None,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Request body for the SMS-send endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmsRequest {
    pub recipient_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_phone: Option<String>,
    pub message: String,
}

impl SmsRequest {
    /// SMS to a single explicit number.
    pub fn to_number(phone: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient_type: "custom".to_string(),
            custom_phone: Some(phone.into()),
            message: message.into(),
        }
    }

    /// SMS to a named recipient group.
    pub fn to_group(group: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient_type: group.into(),
            custom_phone: None,
            message: message.into(),
        }
    }
}

/// Success/failure response of the send endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
