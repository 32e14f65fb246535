//! Administrator sign-in and forced password reset.

use crate::rows::decode;
use crate::session::SessionContext;
use serde_json::json;
use sow_api_client::Filter;
use sow_core::models::{tables, Profile};
use sow_core::validation::validate_password_reset;
use sow_core::{Error, Result};
use tracing::{info, instrument, warn};

/// Message shown to non-administrators.
pub const ACCESS_DENIED: &str = "存取拒絕：您不具備管理員權限。";

/// Result of an administrator sign-in.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminOutcome {
    /// Dashboard may open
    Ready(Profile),
    /// A new password must be set first
    PasswordResetRequired(Profile),
}

impl AdminOutcome {
    /// The signed-in profile.
    pub fn profile(&self) -> &Profile {
        match self {
            AdminOutcome::Ready(p) | AdminOutcome::PasswordResetRequired(p) => p,
        }
    }
}

/// Sign in and require the administrator flag. Non-administrators are
/// signed out again.
#[instrument(skip(session, password))]
pub async fn admin_sign_in(session: &SessionContext, email: &str, password: &str) -> Result<AdminOutcome> {
    let profile = session.sign_in(email, password).await?;
    if !profile.is_admin {
        warn!(user_id = %profile.id, "Administrator access refused");
        if let Err(e) = session.sign_out().await {
            warn!(error = %e, "Sign-out after refused access failed");
        }
        return Err(Error::forbidden(ACCESS_DENIED));
    }

    info!(user_id = %profile.id, "Administrator signed in");
    Ok(if profile.needs_password_reset {
        AdminOutcome::PasswordResetRequired(profile)
    } else {
        AdminOutcome::Ready(profile)
    })
}

/// Set a new password and clear the reset flag.
#[instrument(skip_all)]
pub async fn reset_password(session: &SessionContext, password: &str, confirmation: &str) -> Result<Profile> {
    let profile = session.require_profile()?;
    validate_password_reset(password, confirmation).to_result()?;

    let gateway = session.gateway();
    gateway.update_password(password).await?;
    let row = gateway
        .update(
            tables::PROFILES,
            &[Filter::Eq("id".into(), json!(profile.id))],
            json!({ "needs_password_reset": false }),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found("profile"))?;

    let updated: Profile = decode(row)?;
    info!(user_id = %updated.id, "Password reset");
    session.publish_profile(updated.clone());
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{auth_user, CallKind, FakeGateway};
    use sow_core::ErrorCode;
    use std::sync::Arc;

    fn seeded(is_admin: bool, needs_reset: bool) -> (Arc<FakeGateway>, SessionContext) {
        let fake = Arc::new(FakeGateway::new());
        fake.add_user("admin@sow.tw", "secret1", auth_user("a1", Some("管理員")));
        fake.seed(
            tables::PROFILES,
            vec![json!({
                "id": "a1",
                "full_name": "管理員",
                "is_admin": is_admin,
                "needs_password_reset": needs_reset,
            })],
        );
        let session = SessionContext::new(fake.clone());
        (fake, session)
    }

    #[tokio::test]
    async fn test_non_admin_is_refused_and_signed_out() {
        let (fake, session) = seeded(false, false);

        let err = admin_sign_in(&session, "admin@sow.tw", "secret1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
        assert_eq!(err.message, ACCESS_DENIED);
        assert!(!session.state().is_signed_in());
        assert_eq!(fake.calls_of(CallKind::SignOut).len(), 1);
    }

    #[tokio::test]
    async fn test_admin_ready() {
        let (_fake, session) = seeded(true, false);
        let outcome = admin_sign_in(&session, "admin@sow.tw", "secret1").await.unwrap();
        assert!(matches!(outcome, AdminOutcome::Ready(_)));
    }

    #[tokio::test]
    async fn test_forced_reset_clears_flag() {
        let (fake, session) = seeded(true, true);
        let outcome = admin_sign_in(&session, "admin@sow.tw", "secret1").await.unwrap();
        assert!(matches!(outcome, AdminOutcome::PasswordResetRequired(_)));

        let updated = reset_password(&session, "newpass", "newpass").await.unwrap();
        assert!(!updated.needs_password_reset);
        assert_eq!(fake.password_of("admin@sow.tw").as_deref(), Some("newpass"));
        assert_eq!(fake.rows(tables::PROFILES)[0]["needs_password_reset"], false);
        assert!(!session.profile().unwrap().needs_password_reset);
    }

    #[tokio::test]
    async fn test_reset_validation_happens_first() {
        let (fake, session) = seeded(true, true);
        admin_sign_in(&session, "admin@sow.tw", "secret1").await.unwrap();

        assert!(reset_password(&session, "short", "short").await.is_err());
        assert!(reset_password(&session, "newpass", "other1").await.is_err());
        assert!(fake.calls_of(CallKind::UpdatePassword).is_empty());
        assert_eq!(fake.password_of("admin@sow.tw").as_deref(), Some("secret1"));
    }
}
