//! Compress command - run the report photo pipeline on a local file

use crate::context::App;
use anyhow::Result;
use clap::Args;
use serde_json::json;
use sow_cli::output::format_size;
use sow_cli::Status;
use sow_core::{Error, ResultExt};
use sow_geo::format_coordinate_label;
use sow_image::{compress_image, extract_gps, CompressOptions};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct CompressArgs {
    /// Photo to compress
    input: PathBuf,

    /// Output file (defaults to <input>-compressed.jpg)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Byte ceiling in KB
    #[arg(long, value_name = "KB")]
    max_kb: Option<usize>,

    /// Cap for the longer edge in pixels
    #[arg(long, value_name = "PX")]
    max_dimension: Option<u32>,
}

pub fn run(app: &App, args: CompressArgs) -> Result<()> {
    let image = &app.config.schema.image;
    let options = CompressOptions {
        max_bytes: args.max_kb.map(|kb| kb * 1024).unwrap_or(image.max_bytes),
        max_dimension: args.max_dimension.unwrap_or(image.max_dimension),
        initial_quality: image.initial_quality,
        ..CompressOptions::default()
    };

    let data = std::fs::read(&args.input)
        .map_err(Error::from)
        .context(format!("Reading {}", args.input.display()))?;
    let gps = extract_gps(&data);
    let photo = compress_image(&data, &options).map_err(Error::from)?;

    let output = args
        .output
        .unwrap_or_else(|| default_output(&args.input, photo.format.extension()));
    std::fs::write(&output, &photo.data)
        .map_err(Error::from)
        .context(format!("Writing {}", output.display()))?;

    if app.json {
        return app.print_json(&json!({
            "output": output,
            "original_bytes": photo.original_bytes,
            "bytes": photo.data.len(),
            "width": photo.width,
            "height": photo.height,
            "quality": photo.quality,
            "gps": gps.map(|c| format_coordinate_label(&c)),
        }));
    }

    Status::success(&format!(
        "{} → {} ({}×{}, {})",
        format_size(photo.original_bytes as u64),
        format_size(photo.data.len() as u64),
        photo.width,
        photo.height,
        match photo.quality {
            Some(q) => format!("quality {q}"),
            None => "unchanged".to_string(),
        }
    ));
    println!("  Saved: {}", output.display());
    if let Some(coord) = gps {
        println!("  GPS:   {}", format_coordinate_label(&coord));
    }
    Ok(())
}

fn default_output(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());
    input.with_file_name(format!("{stem}-compressed.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_sits_next_to_input() {
        let out = default_output(Path::new("/tmp/photos/heron.png"), "jpg");
        assert_eq!(out, PathBuf::from("/tmp/photos/heron-compressed.jpg"));
    }
}
