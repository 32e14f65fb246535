//! Feedback, feed, species wall and likes

use crate::context::App;
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::Args;
use owo_colors::OwoColorize;
use sow_cli::{progress, Status, Table};
use sow_core::models::{FeedbackEntry, RowId, SpeciesReport};
use sow_field::{Applied, FeedbackFlow, SpeciesWall};

#[derive(Args)]
pub struct FeedbackArgs {
    /// Your answer; without it the prompt is only shown
    answer: Option<String>,

    /// Where you are writing from, e.g. the site you checked in at
    #[arg(short, long)]
    location: Option<String>,
}

#[derive(Args)]
pub struct FeedArgs {
    /// Keep printing new entries as they arrive
    #[arg(short, long)]
    follow: bool,
}

#[derive(Args)]
pub struct SpeciesArgs {
    /// Keep printing new reports as they arrive
    #[arg(short, long)]
    follow: bool,
}

#[derive(Args)]
pub struct LikeArgs {
    /// Entry id, as shown by `sow feed` or `sow species`
    id: String,

    /// Like a species report instead of a feedback entry
    #[arg(short, long)]
    species: bool,
}

pub async fn feedback(app: &App, args: FeedbackArgs) -> Result<()> {
    let (session, profile) = app.signed_in().await?;
    let mut flow = FeedbackFlow::new(session.gateway(), profile, &app.config.schema.feedback);

    let Some(answer) = args.answer else {
        if app.json {
            return app.print_json(&serde_json::json!({ "question": flow.question() }));
        }
        Status::header("今日提問");
        println!("{}", flow.question());
        println!();
        println!("{}", "Answer with: sow feedback \"<your answer>\"".dimmed());
        return Ok(());
    };

    let question = flow.question();
    flow.set_location_label(args.location);
    flow.set_draft(answer);

    let pb = progress::spinner("Sending...");
    let sent = flow.submit().await;
    pb.finish_and_clear();
    let entry = sent?;

    if app.json {
        return app.print_json(&entry);
    }
    Status::success("回饋已送出");
    println!("  {} {}", "Q:".dimmed(), question);
    println!("  {} {}", "A:".dimmed(), entry.content);
    Ok(())
}

pub async fn feed(app: &App, args: FeedArgs) -> Result<()> {
    let (session, profile) = app.signed_in().await?;
    let mut flow = FeedbackFlow::new(session.gateway(), profile, &app.config.schema.feedback);
    flow.load_recent().await?;

    if app.json && !args.follow {
        return app.print_json(&flow.entries());
    }
    print_feedback(flow.entries());

    if args.follow {
        flow.subscribe().await?;
        Status::info("Following new entries (Ctrl-C to stop)");
        while let Some(applied) = flow.next_event().await {
            if let (Applied::Inserted, Some(entry)) = (applied, flow.entries().first()) {
                print_feedback(std::slice::from_ref(entry));
            }
        }
    }
    Ok(())
}

pub async fn species(app: &App, args: SpeciesArgs) -> Result<()> {
    let session = app.session().await?;
    let mut wall = SpeciesWall::new(session.gateway());
    wall.load().await?;

    if app.json && !args.follow {
        return app.print_json(&wall.reports());
    }
    print_reports(wall.reports());

    if args.follow {
        wall.subscribe().await?;
        Status::info("Following new reports (Ctrl-C to stop)");
        while let Some(applied) = wall.next_event().await {
            if let (Applied::Inserted, Some(report)) = (applied, wall.reports().first()) {
                print_reports(std::slice::from_ref(report));
            }
        }
    }
    Ok(())
}

pub async fn like(app: &App, args: LikeArgs) -> Result<()> {
    let id = parse_row_id(&args.id);

    let likes = if args.species {
        let session = app.session().await?;
        let mut wall = SpeciesWall::new(session.gateway());
        wall.load().await?;
        wall.like(&id).await?
    } else {
        let (session, profile) = app.signed_in().await?;
        let mut flow = FeedbackFlow::new(session.gateway(), profile, &app.config.schema.feedback);
        flow.load_recent().await?;
        flow.like(&id).await?
    };

    if app.json {
        return app.print_json(&serde_json::json!({ "id": id, "likes": likes }));
    }
    Status::success(&format!("♥ {likes}"));
    Ok(())
}

fn parse_row_id(raw: &str) -> RowId {
    RowId::from(raw.trim())
}

fn when(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%m/%d %H:%M").to_string())
        .unwrap_or_default()
}

fn print_feedback(entries: &[FeedbackEntry]) {
    let mut table = Table::new(["ID", "♥", "When", "Answer", "Where"]);
    for entry in entries {
        table.row([
            entry.id.to_string(),
            entry.likes.to_string(),
            when(entry.created_at),
            entry.content.clone(),
            entry.location_name.clone().unwrap_or_default(),
        ]);
    }
    table.print();
}

fn print_reports(reports: &[SpeciesReport]) {
    let mut table = Table::new(["ID", "♥", "When", "Species", "Reporter", "Location"]);
    for report in reports {
        table.row([
            report.id.to_string(),
            report.likes.to_string(),
            when(report.created_at),
            report.species_name.clone(),
            report.reporter_nature_name.clone().unwrap_or_default(),
            report.gps_location.clone().unwrap_or_default(),
        ]);
    }
    table.print();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row_id() {
        assert_eq!(parse_row_id("42"), RowId::Int(42));
        assert_eq!(parse_row_id(" 42 "), RowId::Int(42));
        assert_eq!(
            parse_row_id("5b1f0c2e-aa"),
            RowId::Text("5b1f0c2e-aa".to_string())
        );
    }
}
