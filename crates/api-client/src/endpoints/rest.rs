//! PostgREST endpoints
//!
//! Tables and views live under `/rest/v1/<table>`, database functions under
//! `/rest/v1/rpc/<function>`.

use crate::client::SupabaseClient;
use crate::error::{ApiError, ApiResult};
use crate::gateway::{Filter, Query};
use reqwest::Method;
use serde_json::Value;

/// Ask PostgREST to echo written rows back.
const PREFER_RETURN: &str = "return=representation";

/// PostgREST interface
#[derive(Clone)]
pub struct RestApi {
    client: SupabaseClient,
}

impl RestApi {
    pub(crate) fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.client.config().rest_url(), table)
    }

    /// GET /rest/v1/<table>?select=..&<filters>&order=..&limit=..
    pub async fn select(&self, table: &str, query: &Query) -> ApiResult<Vec<Value>> {
        let request = self
            .client
            .request(Method::GET, &self.table_url(table))
            .query(&query.to_params());
        self.client.send_json(request).await
    }

    /// POST /rest/v1/<table>
    ///
    /// Returns the stored row, including server defaults such as `id` and
    /// `created_at`.
    pub async fn insert(&self, table: &str, record: &Value) -> ApiResult<Value> {
        let request = self
            .client
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", PREFER_RETURN)
            .json(record);

        let rows: Vec<Value> = self.client.send_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::EmptyResponse(table.to_string()))
    }

    /// PATCH /rest/v1/<table>?<filters>
    pub async fn update(&self, table: &str, filters: &[Filter], patch: &Value) -> ApiResult<Vec<Value>> {
        if filters.is_empty() {
            // PostgREST would patch the whole table
            return Err(ApiError::config(format!("refusing unfiltered update of {table}")));
        }

        let params: Vec<(String, String)> = filters.iter().map(Filter::to_param).collect();
        let request = self
            .client
            .request(Method::PATCH, &self.table_url(table))
            .header("Prefer", PREFER_RETURN)
            .query(&params)
            .json(patch);
        self.client.send_json(request).await
    }

    /// POST /rest/v1/rpc/<function>
    pub async fn rpc(&self, function: &str, args: &Value) -> ApiResult<Value> {
        let url = format!("{}/rpc/{}", self.client.config().rest_url(), function);
        let request = self.client.request(Method::POST, &url).json(args);
        self.client.send_json(request).await
    }
}
