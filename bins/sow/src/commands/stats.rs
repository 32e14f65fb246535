//! Leaderboard and personal stats

use crate::context::App;
use anyhow::Result;
use chrono::Local;
use clap::Args;
use serde_json::json;
use sow_cli::output::heat_cell;
use sow_cli::{Status, Table};
use sow_field::leaderboard::{load_leaderboard, Scope};
use sow_field::stats::load_stats;

#[derive(Args)]
pub struct LeaderboardArgs {
    /// Only this branch
    #[arg(short, long, conflicts_with = "group")]
    branch: Option<String>,

    /// Only this volunteer group
    #[arg(short, long)]
    group: Option<String>,

    /// Number of volunteers shown
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Weeks shown in the heat map
    #[arg(short, long, default_value = "12")]
    weeks: usize,
}

const WEEKDAYS: [&str; 7] = ["日", "一", "二", "三", "四", "五", "六"];

pub async fn leaderboard(app: &App, args: LeaderboardArgs) -> Result<()> {
    let session = app.session().await?;
    let scope = Scope::from_filter(args.branch.as_deref(), args.group.as_deref());
    let limit = args.limit.unwrap_or(app.config.schema.leaderboard.limit);
    let entries = load_leaderboard(session.gateway().as_ref(), &scope, limit).await?;

    if app.json {
        return app.print_json(&entries);
    }

    let title = match &scope {
        Scope::All => "英雄榜".to_string(),
        Scope::Branch(b) => format!("英雄榜 · {b}"),
        Scope::Group(g) => format!("英雄榜 · {g}"),
    };
    Status::header(&title);
    if entries.is_empty() {
        Status::info("No contributions yet");
        return Ok(());
    }

    let mut table = Table::new(["#", "Name", "Branch", "Group", "Check-ins", "Reports", "Total"]);
    for e in &entries {
        table.row([
            e.rank.to_string(),
            e.name.clone(),
            e.branch.clone(),
            e.group.clone(),
            e.checkins.to_string(),
            e.reports.to_string(),
            e.total.to_string(),
        ]);
    }
    table.print();
    Ok(())
}

pub async fn stats(app: &App, args: StatsArgs) -> Result<()> {
    let (session, profile) = app.signed_in().await?;
    let today = Local::now().date_naive();
    let stats = load_stats(session.gateway().as_ref(), &profile.id, today).await?;

    if app.json {
        return app.print_json(&json!({
            "total": stats.total,
            "streak": stats.streak,
            "today_level": stats.level_on(today),
            "days": stats.days,
        }));
    }

    Status::header(&format!("{} 的足跡", profile.display_name()));
    println!("  Total contributions: {}", stats.total);
    println!("  Current streak:      {} days", stats.streak);
    println!();

    for (weekday, row) in WEEKDAYS.iter().zip(stats.heat_grid(today, args.weeks)) {
        let cells: Vec<String> = row
            .into_iter()
            .map(|level| level.map(heat_cell).unwrap_or_else(|| " ".to_string()))
            .collect();
        println!("  {} {}", weekday, cells.join(" "));
    }
    Ok(())
}
