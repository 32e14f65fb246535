//! History command - list or export your check-ins

use crate::context::App;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Args;
use sow_cli::{Status, Table};
use sow_field::history::{load_history, write_csv, DateRange};
use std::path::PathBuf;

#[derive(Args)]
pub struct HistoryArgs {
    /// First day included (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day included (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Export as CSV; the file name defaults to the date range
    #[arg(short, long, value_name = "FILE", num_args = 0..=1, default_missing_value = "")]
    export: Option<String>,
}

pub async fn run(app: &App, args: HistoryArgs) -> Result<()> {
    let (session, profile) = app.signed_in().await?;
    let range = DateRange::new(args.from, args.to)?;
    let records = load_history(session.gateway().as_ref(), &profile.id, &range).await?;
    let now = Local::now();
    let offset = *now.offset();

    if let Some(path) = args.export {
        let path = if path.is_empty() {
            PathBuf::from(range.file_name(now.date_naive()))
        } else {
            PathBuf::from(path)
        };
        write_csv(&path, &records, &offset)?;
        Status::success(&format!("Exported {} check-ins to {}", records.len(), path.display()));
        return Ok(());
    }

    if app.json {
        return app.print_json(&records);
    }

    if records.is_empty() {
        Status::info("No check-ins in this range");
        return Ok(());
    }

    let mut table = Table::new(["日期", "時間", "簽到地點"]);
    for record in &records {
        let local = record.created_at.with_timezone(&offset);
        table.row([
            local.format("%Y/%-m/%-d").to_string(),
            local.format("%H:%M:%S").to_string(),
            record.location_name.clone(),
        ]);
    }
    table.print();
    Ok(())
}
