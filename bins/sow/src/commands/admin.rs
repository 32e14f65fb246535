//! Administrator commands

use crate::commands::account::print_token;
use crate::context::App;
use anyhow::Result;
use clap::Subcommand;
use sow_cli::{progress, Status};
use sow_field::{admin_sign_in, reset_password, AdminOutcome, SessionContext};

#[derive(Subcommand)]
pub enum AdminAction {
    /// Sign in as an administrator
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "SOW_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Set a new password (required after a reset)
    ResetPassword {
        /// New password, at least 6 characters
        #[arg(short, long, env = "SOW_NEW_PASSWORD", hide_env_values = true)]
        password: String,

        /// The same password again
        #[arg(short, long)]
        confirm: String,
    },
}

pub async fn run(app: &App, action: AdminAction) -> Result<()> {
    match action {
        AdminAction::Login { email, password } => {
            let session = SessionContext::new(app.gateway()?);
            let pb = progress::spinner("Signing in...");
            let outcome = admin_sign_in(&session, &email, &password).await;
            pb.finish_and_clear();
            let outcome = outcome?;

            if app.json {
                return app.print_json(&serde_json::json!({
                    "user_id": outcome.profile().id,
                    "password_reset_required": matches!(outcome, AdminOutcome::PasswordResetRequired(_)),
                }));
            }
            Status::success(&format!("管理員 {} 已登入", outcome.profile().display_name()));
            if let AdminOutcome::PasswordResetRequired(_) = outcome {
                Status::warning("A new password is required: run `sow admin reset-password`");
            }
            print_token(&session).await
        }

        AdminAction::ResetPassword { password, confirm } => {
            let (session, _) = app.signed_in().await?;
            let profile = reset_password(&session, &password, &confirm).await?;
            if app.json {
                return app.print_json(&profile);
            }
            Status::success("Password updated");
            Ok(())
        }
    }
}
