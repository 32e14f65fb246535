//! Report command - submit a species sighting

use crate::context::{parse_coordinate, App};
use anyhow::Result;
use clap::Args;
use sow_cli::output::format_size;
use sow_cli::{progress, Status};
use sow_core::{Error, ResultExt};
use sow_field::{CoordinateSource, ReportFlow};
use sow_geo::format_coordinate_label;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args)]
pub struct ReportArgs {
    /// Species name
    #[arg(short, long)]
    species: String,

    /// Photo of the sighting
    #[arg(short, long)]
    photo: PathBuf,

    /// What you saw
    #[arg(short, long, default_value = "")]
    description: String,

    /// Sighting location as "lat, lng" when the photo has no GPS
    #[arg(short, long, value_name = "LAT,LNG")]
    location: Option<String>,
}

pub async fn run(app: &App, args: ReportArgs) -> Result<()> {
    let (session, profile) = app.signed_in().await?;
    let locate_timeout = Duration::from_secs(app.config.schema.checkin.locate_timeout_secs);
    let mut flow = ReportFlow::new(
        session.gateway(),
        app.positions(),
        profile,
        app.config.schema.image.clone(),
        locate_timeout,
    );

    let bytes = std::fs::read(&args.photo)
        .map_err(Error::from)
        .context(format!("Reading {}", args.photo.display()))?;

    let pb = progress::spinner("Compressing photo...");
    let attached = flow.attach_photo(bytes).await;
    pb.finish_and_clear();
    attached?;

    if let Some(photo) = flow.photo() {
        Status::info(&format!(
            "Photo {} → {}",
            format_size(photo.original_bytes as u64),
            format_size(photo.data.len() as u64)
        ));
    }

    match (flow.location(), args.location) {
        (Some((_, CoordinateSource::Photo)), _) => {}
        (_, Some(label)) => flow.set_location(parse_coordinate(&label)?)?,
        (_, None) if app.position.is_some() => {
            flow.locate().await?;
        }
        (_, None) => Status::warning("No location: the report is saved without coordinates"),
    }
    if let Some((coordinate, source)) = flow.location() {
        let from = match source {
            CoordinateSource::Photo => "from photo",
            CoordinateSource::Sensor => "from --at",
            CoordinateSource::Manual => "entered",
        };
        Status::info(&format!("Location {} ({from})", format_coordinate_label(&coordinate)));
    }

    flow.set_species_name(args.species);
    flow.set_description(args.description);

    let pb = progress::spinner("Uploading...");
    let receipt = match flow.submit().await {
        Ok(receipt) => receipt,
        Err(e) => {
            pb.finish_and_clear();
            for path in flow.orphans() {
                Status::warning(&format!("Uploaded photo could not be removed: {path}"));
            }
            return Err(e.into());
        }
    };
    progress::finish_success(&pb, "Report submitted");

    if app.json {
        return app.print_json(&receipt);
    }
    Status::success(&format!("物種回報成功 ({})", receipt.image_url));
    Ok(())
}
