//! Distance command - great-circle distance between two coordinates

use crate::context::{parse_coordinate, App};
use anyhow::Result;
use clap::Args;
use serde_json::json;
use sow_cli::output::{format_distance, gate_badge};
use sow_geo::haversine_distance;

#[derive(Args)]
pub struct DistanceArgs {
    /// From, as "lat, lng"
    from: String,

    /// To, as "lat, lng"
    to: String,

    /// Check-in radius in km (defaults to the configured radius)
    #[arg(short, long)]
    radius: Option<f64>,
}

pub fn run(app: &App, args: DistanceArgs) -> Result<()> {
    let from = parse_coordinate(&args.from)?;
    let to = parse_coordinate(&args.to)?;
    let radius = args.radius.unwrap_or(app.config.schema.checkin.radius_km);
    let distance = haversine_distance(&from, &to);

    if app.json {
        return app.print_json(&json!({
            "distance_km": distance,
            "radius_km": radius,
            "within": distance <= radius,
        }));
    }

    println!("{}", format_distance(distance));
    println!("{}", gate_badge(Some(distance), radius));
    Ok(())
}
