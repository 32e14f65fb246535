//! Check-in command - list sites or check in at one

use crate::context::App;
use anyhow::Result;
use clap::Args;
use sow_cli::output::{format_distance, gate_badge};
use sow_cli::{progress, Status, Table};
use sow_core::vocab::FREE_FORM_SITE;
use sow_field::{CheckinFlow, CheckinState, SiteChoice};
use std::time::Duration;

#[derive(Args)]
pub struct CheckinArgs {
    /// Site name from `sow checkin --list`
    site: Option<String>,

    /// Check in at a free-form site with this label (no distance limit)
    #[arg(long, value_name = "LABEL", conflicts_with = "site")]
    free: Option<String>,

    /// List the sites of your branch, nearest first when --at is given
    #[arg(short, long)]
    list: bool,

    /// Keep sampling until you are in range instead of one fix
    #[arg(short, long)]
    watch: bool,
}

pub async fn run(app: &App, args: CheckinArgs) -> Result<()> {
    let (session, profile) = app.signed_in().await?;
    let config = app.config.schema.checkin.clone();
    let mut flow = CheckinFlow::new(session.gateway(), app.positions(), profile, config);

    let pb = progress::spinner("Loading sites...");
    let loaded = flow.load_sites().await.map(<[_]>::len);
    pb.finish_and_clear();
    loaded?;

    let choice = match (args.free, args.site) {
        (Some(label), _) => Some((SiteChoice::FreeForm, label)),
        (None, Some(name)) => Some((SiteChoice::Listed(name), String::new())),
        (None, None) => None,
    };
    let Some((choice, label)) = choice.filter(|_| !args.list) else {
        return list_sites(app, &flow);
    };

    flow.select_site(choice)?;
    if !label.is_empty() {
        flow.set_free_form_label(label);
    } else if args.watch {
        watch_until_in_range(app, &mut flow).await;
    } else if let Err(e) = flow.check_once().await {
        Status::warning(&e.message);
    }

    if flow.state() != CheckinState::Submittable && flow.distance_km().is_some() {
        println!("{}", gate_badge(flow.distance_km(), flow.radius_km()));
    }

    let pb = progress::spinner("Checking in...");
    let receipt = match flow.submit().await {
        Ok(receipt) => receipt,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };
    progress::finish_success(&pb, "Checked in");

    if app.json {
        return app.print_json(&receipt);
    }
    Status::success(&format!("簽到成功：{}", receipt.location_name));
    if let Some(distance) = receipt.distance_km {
        println!("  {}", gate_badge(Some(distance), flow.radius_km()));
    }
    Ok(())
}

fn list_sites(app: &App, flow: &CheckinFlow) -> Result<()> {
    let ranked = app.position.map(|origin| flow.nearest_sites(&origin));

    if app.json {
        return match ranked {
            Some(ranked) => app.print_json(&ranked),
            None => app.print_json(&flow.sites()),
        };
    }

    let mut table = Table::new(["Site", "Distance", ""]);
    match ranked {
        Some(ranked) => {
            for site in ranked {
                let mark = if site.is_within(flow.radius_km()) { "in range" } else { "" };
                table.row([site.name, format_distance(site.distance_km), mark.to_string()]);
            }
        }
        None => {
            for site in flow.sites() {
                table.row([site.location_name.clone(), "-".to_string(), String::new()]);
            }
        }
    }
    table.row([FREE_FORM_SITE.to_string(), "-".to_string(), "--free <LABEL>".to_string()]);
    table.print();
    Ok(())
}

async fn watch_until_in_range(app: &App, flow: &mut CheckinFlow) {
    let limit = Duration::from_secs(app.config.schema.checkin.locate_timeout_secs);
    let pb = progress::spinner("Locating...");
    let deadline = tokio::time::Instant::now() + limit;

    loop {
        match tokio::time::timeout_at(deadline, flow.next_sample()).await {
            Ok(Some(CheckinState::Submittable)) => break,
            Ok(Some(_)) => pb.set_message(gate_badge(flow.distance_km(), flow.radius_km())),
            Ok(None) | Err(_) => break,
        }
    }
    pb.finish_and_clear();
}
