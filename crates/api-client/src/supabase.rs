//! [`Gateway`] over a Supabase project.

use crate::client::SupabaseClient;
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::gateway::{Filter, Gateway, Query, Session, Subscription};
use crate::realtime;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Supabase-backed gateway.
#[derive(Clone, Debug)]
pub struct SupabaseGateway {
    client: SupabaseClient,
}

impl SupabaseGateway {
    /// Gateway configured from the environment.
    pub fn from_env() -> ApiResult<Self> {
        Ok(Self {
            client: SupabaseClient::new()?,
        })
    }

    /// Gateway with explicit configuration.
    pub fn with_config(config: ClientConfig) -> ApiResult<Self> {
        Ok(Self {
            client: SupabaseClient::with_config(config)?,
        })
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }
}

#[async_trait]
impl Gateway for SupabaseGateway {
    #[instrument(skip(self, record))]
    async fn insert(&self, table: &str, record: Value) -> ApiResult<Value> {
        self.client.rest().insert(table, &record).await
    }

    #[instrument(skip(self))]
    async fn query(&self, table: &str, query: &Query) -> ApiResult<Vec<Value>> {
        self.client.rest().select(table, query).await
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> ApiResult<Vec<Value>> {
        self.client.rest().update(table, filters, &patch).await
    }

    #[instrument(skip(self))]
    async fn rpc(&self, function: &str, args: Value) -> ApiResult<Value> {
        self.client.rest().rpc(function, &args).await
    }

    async fn subscribe(&self, table: &str) -> ApiResult<Subscription> {
        let token = self.client.bearer_token();
        realtime::subscribe(self.client.config(), table, &token).await
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload_file(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ApiResult<String> {
        let storage = self.client.storage();
        storage.upload(bucket, path, bytes, content_type).await?;
        Ok(storage.public_url(bucket, path))
    }

    #[instrument(skip(self))]
    async fn remove_file(&self, bucket: &str, path: &str) -> ApiResult<()> {
        self.client.storage().remove(bucket, path).await
    }

    async fn session(&self) -> ApiResult<Option<Session>> {
        if let Some(session) = self.client.current_session() {
            return Ok(Some(session));
        }

        // Restore from a token handed over through the environment
        let Some(token) = self.client.config().access_token.clone() else {
            return Ok(None);
        };

        match self.client.auth().user(&token).await {
            Ok(user) => {
                debug!(user_id = %user.id, "Restored session from stored token");
                let session = Session {
                    access_token: token,
                    refresh_token: None,
                    expires_in: None,
                    user,
                };
                self.client.set_session(Some(session.clone()));
                Ok(Some(session))
            }
            Err(e) if e.is_auth_error() => {
                warn!("Stored access token was rejected");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<Session> {
        let session = self.client.auth().sign_in_with_password(email, password).await?;
        info!(user_id = %session.user.id, "Signed in");
        self.client.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> ApiResult<()> {
        if self.client.current_session().is_none() && self.client.config().access_token.is_none() {
            return Ok(());
        }
        let result = self.client.auth().sign_out().await;
        // Local state is cleared even when the server call fails
        self.client.set_session(None);
        result
    }

    async fn update_password(&self, new_password: &str) -> ApiResult<()> {
        if self.session().await?.is_none() {
            return Err(ApiError::NotSignedIn);
        }
        self.client.auth().update_password(new_password).await.map(|_| ())
    }

    fn on_auth_state_change(&self) -> watch::Receiver<Option<Session>> {
        self.client.watch_session()
    }
}
