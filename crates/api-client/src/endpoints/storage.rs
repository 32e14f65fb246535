//! Storage endpoints

use crate::client::SupabaseClient;
use crate::error::ApiResult;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::json;

/// Storage interface
#[derive(Clone)]
pub struct StorageApi {
    client: SupabaseClient,
}

impl StorageApi {
    pub(crate) fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// POST /storage/v1/object/<bucket>/<path>
    ///
    /// Never overwrites: an existing object at `path` is an error.
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ApiResult<()> {
        let url = format!("{}/object/{}/{}", self.client.config().storage_url(), bucket, path);
        let request = self
            .client
            .request(Method::POST, &url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.client.send_empty(request).await
    }

    /// DELETE /storage/v1/object/<bucket>
    pub async fn remove(&self, bucket: &str, path: &str) -> ApiResult<()> {
        let url = format!("{}/object/{}", self.client.config().storage_url(), bucket);
        let request = self
            .client
            .request(Method::DELETE, &url)
            .json(&json!({ "prefixes": [path] }));
        self.client.send_empty(request).await
    }

    /// Public URL of an object in a public bucket
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        self.client.config().public_object_url(bucket, path)
    }
}
