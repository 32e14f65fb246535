//! Signed-in user and profile, shared by every flow.
//!
//! [`SessionContext`] is the single owner of "who is signed in". It keeps
//! the auth user and profile in a `watch` channel; flows are handed a
//! [`Profile`] snapshot when they are built.

use crate::rows::decode;
use serde_json::json;
use sow_api_client::{AuthUser, Filter, Gateway, Query, Session};
use sow_core::models::{tables, NewProfile, Profile, ProfileUpdate};
use sow_core::validation::{validate_profile_update, validate_registration};
use sow_core::vocab::{DEFAULT_FULL_NAME, UNSET};
use sow_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Snapshot of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Auth user, when signed in
    pub user: Option<AuthUser>,
    /// Profile row of that user
    pub profile: Option<Profile>,
}

impl SessionState {
    /// Whether a user is signed in.
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Session owner. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionContext {
    gateway: Arc<dyn Gateway>,
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionContext {
    /// Signed out, backed by `gateway`.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            gateway,
            state: Arc::new(state),
        }
    }

    /// The gateway flows should share.
    pub fn gateway(&self) -> Arc<dyn Gateway> {
        Arc::clone(&self.gateway)
    }

    /// Receive every session change.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Current profile, if signed in.
    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    /// Current profile, or an auth error.
    pub fn require_profile(&self) -> Result<Profile> {
        self.profile()
            .ok_or_else(|| Error::unauthorized("Sign in to continue"))
    }

    fn require_user(&self) -> Result<AuthUser> {
        self.state
            .borrow()
            .user
            .clone()
            .ok_or_else(|| Error::unauthorized("Sign in to continue"))
    }

    pub(crate) fn publish_profile(&self, profile: Profile) {
        self.state.send_modify(|state| state.profile = Some(profile));
    }

    fn publish(&self, user: Option<AuthUser>, profile: Option<Profile>) {
        self.state.send_replace(SessionState { user, profile });
    }

    /// Pick up an existing backend session, loading its profile.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<Profile>> {
        match self.gateway.session().await? {
            Some(session) => {
                let profile = self.load(session.user).await?;
                Ok(Some(profile))
            }
            None => {
                self.publish(None, None);
                Ok(None)
            }
        }
    }

    /// Password sign-in; creates the profile row on first sign-in.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Profile> {
        let session = self.gateway.sign_in_with_password(email, password).await?;
        self.load(session.user).await
    }

    /// End the session locally and on the backend.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.gateway.sign_out().await;
        self.publish(None, None);
        info!("Signed out");
        result.map_err(Error::from)
    }

    /// Follow a session change reported by the backend.
    pub async fn apply_auth_change(&self, session: Option<Session>) -> Result<()> {
        match session {
            Some(session) => {
                let current = self.state();
                let same_user = current.user.as_ref().map(|u| &u.id) == Some(&session.user.id);
                if same_user && current.profile.is_some() {
                    return Ok(());
                }
                self.load(session.user).await.map(|_| ())
            }
            None => {
                self.publish(None, None);
                Ok(())
            }
        }
    }

    /// Keep this context in step with backend auth changes until the
    /// returned guard is dropped.
    pub fn follow_auth_changes(&self) -> AuthListener {
        let mut changes = self.gateway.on_auth_state_change();
        let context = self.clone();
        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let session = changes.borrow_and_update().clone();
                if let Err(e) = context.apply_auth_change(session).await {
                    warn!(error = %e, "Failed to follow auth change");
                }
            }
        });
        AuthListener { task }
    }

    async fn load(&self, user: AuthUser) -> Result<Profile> {
        let profile = fetch_or_create_profile(self.gateway.as_ref(), &user).await?;
        self.publish(Some(user), Some(profile.clone()));
        Ok(profile)
    }

    /// Re-read the profile row.
    pub async fn refresh_profile(&self) -> Result<Profile> {
        let user = self.require_user()?;
        self.load(user).await
    }

    /// Complete registration: validate and store the full profile.
    #[instrument(skip(self, registration))]
    pub async fn register(&self, mut registration: NewProfile) -> Result<Profile> {
        let user = self.require_user()?;
        registration.id = user.id.clone();
        if registration.email.is_none() {
            registration.email = user.email.clone();
        }
        validate_registration(&registration).to_result()?;

        let existing = find_profile(self.gateway.as_ref(), &user.id).await?;
        let record = serde_json::to_value(&registration)?;
        let row = match existing {
            Some(_) => self
                .gateway
                .update(tables::PROFILES, &[id_filter(&user.id)], record)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::not_found("profile"))?,
            None => self.gateway.insert(tables::PROFILES, record).await?,
        };

        let profile: Profile = decode(row)?;
        info!(user_id = %profile.id, branch = profile.branch_or_unset(), "Registration complete");
        self.publish_profile(profile.clone());
        Ok(profile)
    }

    /// Self-service profile edit.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile> {
        let profile = self.require_profile()?;
        validate_profile_update(&update).to_result()?;

        let patch = serde_json::to_value(&update)?;
        let row = self
            .gateway
            .update(tables::PROFILES, &[id_filter(&profile.id)], patch)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("profile"))?;

        let updated: Profile = decode(row)?;
        debug!(user_id = %updated.id, "Profile updated");
        self.publish_profile(updated.clone());
        Ok(updated)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Background follower of auth changes. Dropping it stops following.
#[derive(Debug)]
pub struct AuthListener {
    task: JoinHandle<()>,
}

impl Drop for AuthListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn id_filter(id: &str) -> Filter {
    Filter::Eq("id".into(), json!(id))
}

async fn find_profile(gateway: &dyn Gateway, user_id: &str) -> Result<Option<Profile>> {
    let rows = gateway
        .query(tables::PROFILES, &Query::new().eq("id", user_id).limit(1))
        .await?;
    rows.into_iter().next().map(decode).transpose()
}

/// Load the user's profile, creating a placeholder row on first sign-in.
pub async fn fetch_or_create_profile(gateway: &dyn Gateway, user: &AuthUser) -> Result<Profile> {
    if let Some(profile) = find_profile(gateway, &user.id).await? {
        return Ok(profile);
    }

    let placeholder = NewProfile {
        id: user.id.clone(),
        full_name: user
            .metadata_full_name()
            .unwrap_or(DEFAULT_FULL_NAME)
            .to_string(),
        nature_name: String::new(),
        branch: UNSET.to_string(),
        volunteer_group: UNSET.to_string(),
        email: user.email.clone(),
        ..NewProfile::default()
    };
    let row = gateway
        .insert(tables::PROFILES, serde_json::to_value(&placeholder)?)
        .await?;
    info!(user_id = %user.id, "Created profile on first sign-in");
    decode(row)
}
