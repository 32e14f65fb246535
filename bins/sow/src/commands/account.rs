//! Sign-in, registration and profile commands

use crate::context::App;
use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use sow_cli::{progress, Status, Table};
use sow_core::models::{NewProfile, Profile, ProfileUpdate};
use sow_core::vocab::{BRANCHES, GROUPS, UNSET};
use sow_core::Error;
use sow_field::SessionContext;

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(short, long)]
    email: String,

    /// Account password
    #[arg(short, long, env = "SOW_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Full name
    #[arg(long)]
    full_name: String,

    /// Nature name
    #[arg(long, default_value = "")]
    nature_name: String,

    /// Branch (see `sow profile --choices`)
    #[arg(long)]
    branch: String,

    /// Volunteer group (see `sow profile --choices`)
    #[arg(long)]
    group: String,

    /// Phone number
    #[arg(long)]
    phone: String,

    /// Training period, e.g. "2024 春季"
    #[arg(long)]
    training_period: Option<String>,
}

#[derive(Args)]
pub struct ProfileArgs {
    /// New full name
    #[arg(long)]
    full_name: Option<String>,

    /// New nature name
    #[arg(long)]
    nature_name: Option<String>,

    /// New branch
    #[arg(long)]
    branch: Option<String>,

    /// New volunteer group
    #[arg(long)]
    group: Option<String>,

    /// New phone number
    #[arg(long)]
    phone: Option<String>,

    /// List the branches and groups to choose from
    #[arg(long)]
    choices: bool,
}

pub async fn login(app: &App, args: LoginArgs) -> Result<()> {
    let session = SessionContext::new(app.gateway()?);
    let pb = progress::spinner("Signing in...");
    let signed_in = session.sign_in(&args.email, &args.password).await;
    pb.finish_and_clear();
    let profile = signed_in?;

    if !app.json {
        Status::success(&format!("歡迎回來，{}", profile.display_name()));
        if profile.branch_or_unset() == UNSET || profile.group_or_unset() == UNSET {
            Status::warning("Your profile is incomplete: run `sow register`");
        }
    }
    print_token(&session).await
}

/// Print the session token for the shell to export.
pub async fn print_token(session: &SessionContext) -> Result<()> {
    let token = session
        .gateway()
        .session()
        .await
        .map_err(Error::from)?
        .map(|s| s.access_token)
        .ok_or_else(|| Error::unauthorized("No session after sign-in"))?;
    println!("export SOW_ACCESS_TOKEN={token}");
    Ok(())
}

pub async fn register(app: &App, args: RegisterArgs) -> Result<()> {
    let session = app.session().await?;
    let registration = NewProfile {
        full_name: args.full_name,
        nature_name: args.nature_name,
        branch: args.branch,
        volunteer_group: args.group,
        phone: Some(args.phone),
        training_period: args.training_period,
        ..NewProfile::default()
    };
    let profile = session.register(registration).await?;

    if app.json {
        return app.print_json(&profile);
    }
    Status::success("註冊完成");
    print_profile(&profile);
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    let session = app.session().await?;
    session.sign_out().await?;
    if !app.json {
        Status::success("已登出");
    }
    println!("unset SOW_ACCESS_TOKEN");
    Ok(())
}

pub async fn profile(app: &App, args: ProfileArgs) -> Result<()> {
    if args.choices {
        Status::header("分會");
        println!("{}", BRANCHES.join("  "));
        Status::header("組別");
        println!("{}", GROUPS.join("  "));
        return Ok(());
    }

    let (session, profile) = app.signed_in().await?;
    let update = ProfileUpdate {
        full_name: args.full_name,
        nature_name: args.nature_name,
        branch: args.branch,
        volunteer_group: args.group,
        phone: args.phone,
    };

    let profile = if update.is_empty() {
        profile
    } else {
        let updated = session.update_profile(update).await?;
        if !app.json {
            Status::success("Profile updated");
        }
        updated
    };

    if app.json {
        return app.print_json(&profile);
    }
    print_profile(&profile);
    Ok(())
}

fn print_profile(profile: &Profile) {
    let or_dash = |v: &Option<String>| v.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| "-".to_string());
    let mut table = Table::new(["", ""]);
    table
        .row(["Name".to_string(), or_dash(&profile.full_name)])
        .row(["Nature name".to_string(), or_dash(&profile.nature_name)])
        .row(["Branch".to_string(), profile.branch_or_unset().to_string()])
        .row(["Group".to_string(), profile.group_or_unset().to_string()])
        .row(["Phone".to_string(), or_dash(&profile.phone)])
        .row(["Email".to_string(), or_dash(&profile.email)]);
    for line in table.render().into_iter().skip(1) {
        println!("  {line}");
    }
    if profile.is_admin {
        println!("  {}", "administrator".cyan());
    }
}
