//! GoTrue auth endpoints

use crate::client::SupabaseClient;
use crate::error::ApiResult;
use crate::gateway::{AuthUser, Session};
use reqwest::Method;
use serde_json::json;

/// Auth interface
#[derive(Clone)]
pub struct AuthApi {
    client: SupabaseClient,
}

impl AuthApi {
    pub(crate) fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.client.config().auth_url(), path)
    }

    /// POST /auth/v1/token?grant_type=password
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<Session> {
        let request = self
            .client
            .request(Method::POST, &self.url("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        self.client.send_json(request).await
    }

    /// GET /auth/v1/user for an explicit token
    pub async fn user(&self, access_token: &str) -> ApiResult<AuthUser> {
        let request = self
            .client
            .request_as(Method::GET, &self.url("user"), access_token);
        self.client.send_json(request).await
    }

    /// PUT /auth/v1/user with a new password
    pub async fn update_password(&self, new_password: &str) -> ApiResult<AuthUser> {
        let request = self
            .client
            .request(Method::PUT, &self.url("user"))
            .json(&json!({ "password": new_password }));
        self.client.send_json(request).await
    }

    /// POST /auth/v1/logout
    pub async fn sign_out(&self) -> ApiResult<()> {
        let request = self.client.request(Method::POST, &self.url("logout"));
        self.client.send_empty(request).await
    }
}
