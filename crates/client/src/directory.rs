//! Client for the user/profile directory service.

use farmline_shared::{ApiError, Profile, User, UserType};

use crate::api_client::ApiClient;

/// Filters for [`DirectoryClient::list_users`]. All fields optional.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub user_type: Option<UserType>,
    pub is_active: Option<bool>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl UserQuery {
    fn to_query_string(&self) -> String {
        let mut params = Vec::new();
        if let Some(user_type) = self.user_type {
            let value = match user_type {
                UserType::Buyer => "buyer",
                UserType::Farmer => "farmer",
                UserType::Admin => "admin",
            };
            params.push(format!("user_type={value}"));
        }
        if let Some(is_active) = self.is_active {
            params.push(format!("is_active={is_active}"));
        }
        if let Some(skip) = self.skip {
            params.push(format!("skip={skip}"));
        }
        if let Some(limit) = self.limit {
            params.push(format!("limit={limit}"));
        }
        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

/// Request/response client for the directory endpoints.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    api: ApiClient,
}

impl DirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiClient::new(base_url),
        }
    }

    /// List directory users, optionally filtered and paged.
    pub async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>, ApiError> {
        self.api
            .get_json(&format!("/api/users{}", query.to_query_string()))
            .await
    }

    /// Fetch the extended profile for a user id.
    pub async fn get_profile(&self, user_id: &str) -> Result<Profile, ApiError> {
        self.api.get_json(&format!("/api/profiles/{user_id}")).await
    }
}
