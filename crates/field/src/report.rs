//! Species report submission.
//!
//! A report needs a species name and a photo. The photo is compressed before
//! upload and its EXIF GPS, when present, becomes the report location. The
//! object is uploaded first and the row inserted second; when the insert
//! fails the uploaded object is removed again.

use crate::position::{locate_once, PositionSource};
use crate::rows::decode;
use serde::Serialize;
use sow_api_client::Gateway;
use sow_core::config::ImageConfig;
use sow_core::models::{tables, NewSpeciesReport, Profile, SpeciesReport};
use sow_core::{Error, Result};
use sow_geo::{format_coordinate_label, Coordinate};
use sow_image::{compress_image, extract_gps, CompressOptions, CompressedImage};
use sow_telemetry::{metrics, names, Timer};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// How long the success notice stays up.
pub const SUCCESS_VISIBLE: Duration = Duration::from_secs(3);

/// Where the report coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSource {
    /// EXIF GPS of the attached photo
    Photo,
    /// Device position
    Sensor,
    /// Typed in
    Manual,
}

#[derive(Debug, Clone)]
struct DraftLocation {
    coordinate: Coordinate,
    source: CoordinateSource,
    set_at: Instant,
}

#[derive(Debug, Default)]
struct ReportDraft {
    species_name: String,
    description: String,
    photo: Option<CompressedImage>,
    photo_error: Option<String>,
    location: Option<DraftLocation>,
}

/// A stored report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportReceipt {
    /// Object path inside the bucket
    pub path: String,
    /// Public photo URL
    pub image_url: String,
    /// Row as returned by the backend
    pub report: Option<SpeciesReport>,
}

/// Report editor and submitter for one volunteer.
pub struct ReportFlow {
    gateway: Arc<dyn Gateway>,
    positions: Arc<dyn PositionSource>,
    profile: Profile,
    image: ImageConfig,
    locate_timeout: Duration,
    bucket: String,
    draft: ReportDraft,
    orphans: Vec<String>,
    succeeded_at: Option<Instant>,
}

impl ReportFlow {
    /// Empty draft.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        positions: Arc<dyn PositionSource>,
        profile: Profile,
        image: ImageConfig,
        locate_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            positions,
            profile,
            image,
            locate_timeout,
            bucket: tables::SPECIES_PHOTOS_BUCKET.to_string(),
            draft: ReportDraft::default(),
            orphans: Vec::new(),
            succeeded_at: None,
        }
    }

    /// Upload into another bucket.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Species name.
    pub fn set_species_name(&mut self, name: impl Into<String>) {
        self.draft.species_name = name.into();
    }

    /// Free-text description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    /// The compressed photo, once attached.
    pub fn photo(&self) -> Option<&CompressedImage> {
        self.draft.photo.as_ref()
    }

    /// Why the last photo was rejected.
    pub fn photo_error(&self) -> Option<&str> {
        self.draft.photo_error.as_deref()
    }

    /// Draft coordinate and its source.
    pub fn location(&self) -> Option<(Coordinate, CoordinateSource)> {
        self.draft
            .location
            .as_ref()
            .map(|loc| (loc.coordinate, loc.source))
    }

    /// Attach a photo. Its GPS, if any, replaces the draft location and is
    /// returned. A rejected photo clears the previous one.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn attach_photo(&mut self, bytes: Vec<u8>) -> Result<Option<Coordinate>> {
        let options = CompressOptions {
            max_bytes: self.image.max_bytes,
            max_dimension: self.image.max_dimension,
            initial_quality: self.image.initial_quality,
            ..CompressOptions::default()
        };

        let timer = Timer::start(names::IMAGE_COMPRESS_MS);
        let processed = tokio::task::spawn_blocking(move || {
            let gps = extract_gps(&bytes);
            compress_image(&bytes, &options).map(|photo| (photo, gps))
        })
        .await
        .map_err(|e| Error::image(format!("Photo processing stopped: {}", e)))?;
        timer.stop();

        match processed {
            Ok((photo, gps)) => {
                debug!(
                    original = photo.original_bytes,
                    compressed = photo.data.len(),
                    width = photo.width,
                    height = photo.height,
                    "Photo attached"
                );
                self.draft.photo = Some(photo);
                self.draft.photo_error = None;
                if let Some(coordinate) = gps {
                    self.place(coordinate, CoordinateSource::Photo);
                }
                Ok(gps)
            }
            Err(e) => {
                warn!(error = %e, "Photo rejected");
                self.draft.photo = None;
                self.draft.photo_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Use the device position as the report location.
    pub async fn locate(&mut self) -> Result<Coordinate> {
        let sample = locate_once(self.positions.as_ref(), self.locate_timeout).await?;
        self.place(sample.coordinate, CoordinateSource::Sensor);
        Ok(sample.coordinate)
    }

    /// Use a typed coordinate as the report location.
    pub fn set_location(&mut self, coordinate: Coordinate) -> Result<()> {
        if !coordinate.is_valid() {
            return Err(Error::validation(format!(
                "Coordinate out of range: {}",
                format_coordinate_label(&coordinate)
            )));
        }
        self.place(coordinate, CoordinateSource::Manual);
        Ok(())
    }

    fn place(&mut self, coordinate: Coordinate, source: CoordinateSource) {
        self.draft.location = Some(DraftLocation {
            coordinate,
            source,
            set_at: Instant::now(),
        });
    }

    /// Whether the location was just filled from the photo.
    pub fn photo_badge_active(&self) -> bool {
        self.draft.location.as_ref().is_some_and(|loc| {
            loc.source == CoordinateSource::Photo
                && loc.set_at.elapsed() < Duration::from_secs(self.image.photo_badge_secs)
        })
    }

    /// Whether the success notice is showing.
    pub fn success_visible(&self) -> bool {
        self.succeeded_at
            .is_some_and(|at| at.elapsed() < SUCCESS_VISIBLE)
    }

    /// Objects whose cleanup failed after a rejected insert.
    pub fn orphans(&self) -> &[String] {
        &self.orphans
    }

    /// Upload the photo and insert the report. The draft survives a failure.
    #[instrument(skip(self), fields(user_id = %self.profile.id))]
    pub async fn submit(&mut self) -> Result<ReportReceipt> {
        let species_name = self.draft.species_name.trim().to_string();
        if species_name.is_empty() {
            return Err(Error::validation("Species name is required"));
        }
        let Some(photo) = self.draft.photo.as_ref() else {
            return Err(Error::validation("A photo is required"));
        };

        let path = object_path(photo.format.extension());
        let timer = Timer::start(names::GATEWAY_CALL_MS);
        let uploaded = self
            .gateway
            .upload_file(&self.bucket, &path, photo.data.clone(), photo.format.mime_type())
            .await;
        timer.stop();
        let image_url = match uploaded {
            Ok(url) => url,
            Err(e) => {
                metrics().increment(names::REPORT_FAILED);
                return Err(Error::upload(e.to_string()).with_source(e));
            }
        };

        let record = NewSpeciesReport {
            user_id: self.profile.id.clone(),
            species_name: species_name.clone(),
            description: self.draft.description.trim().to_string(),
            gps_location: self
                .draft
                .location
                .as_ref()
                .map(|loc| format_coordinate_label(&loc.coordinate)),
            image_url: image_url.clone(),
            reporter_nature_name: self.profile.display_name().to_string(),
            reporter_branch: self.profile.branch_or_unset().to_string(),
            reporter_group: self.profile.group_or_unset().to_string(),
        };
        let record = serde_json::to_value(&record)?;

        let row = match self.gateway.insert(tables::SPECIES_REPORTS, record).await {
            Ok(row) => row,
            Err(e) => {
                metrics().increment(names::REPORT_FAILED);
                warn!(path = %path, error = %e, "Report insert failed; removing photo");
                self.cleanup(path).await;
                return Err(Error::from(e).with_context(format!("Report of {}", species_name)));
            }
        };

        let report = decode::<SpeciesReport>(row)
            .map_err(|e| warn!(error = %e, "Stored report could not be read back"))
            .ok();
        self.draft = ReportDraft::default();
        self.succeeded_at = Some(Instant::now());
        metrics().increment(names::REPORT_SUBMITTED);
        info!(species = %species_name, path = %path, "Report submitted");

        Ok(ReportReceipt {
            path,
            image_url,
            report,
        })
    }

    async fn cleanup(&mut self, path: String) {
        match self.gateway.remove_file(&self.bucket, &path).await {
            Ok(()) => metrics().increment(names::REPORT_ORPHAN_CLEANUP),
            Err(e) => {
                warn!(path = %path, error = %e, "Uploaded photo left behind");
                metrics().increment(names::REPORT_ORPHAN_KEPT);
                self.orphans.push(path);
            }
        }
    }

    /// Try again to remove objects left behind. Returns how many are left.
    pub async fn retry_orphan_cleanup(&mut self) -> usize {
        for path in std::mem::take(&mut self.orphans) {
            self.cleanup(path).await;
        }
        self.orphans.len()
    }
}

fn object_path(extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}.{}", millis, &suffix[..8], extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::FixedPosition;
    use crate::testing::{CallKind, FakeGateway};
    use serde_json::json;
    use sow_core::ErrorCode;
    use sow_image::fixtures::jpeg_with_gps;

    fn profile() -> Profile {
        serde_json::from_value(json!({
            "id": "u1",
            "full_name": "林小明",
            "nature_name": "大冠鷲",
            "branch": "台北分會",
        }))
        .unwrap()
    }

    fn sighting() -> Coordinate {
        Coordinate::new(25.0330, 121.5654)
    }

    fn flow(fake: &Arc<FakeGateway>) -> ReportFlow {
        ReportFlow::new(
            fake.clone(),
            Arc::new(FixedPosition::new(Coordinate::new(24.1477, 120.6736))),
            profile(),
            ImageConfig::default(),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_photo_gps_fills_location() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);

        let gps = flow.attach_photo(jpeg_with_gps(sighting(), 64, 48)).await.unwrap();
        let gps = gps.unwrap();
        assert!((gps.latitude - 25.0330).abs() < 1e-4);
        let (_, source) = flow.location().unwrap();
        assert_eq!(source, CoordinateSource::Photo);
        assert!(flow.photo_badge_active());
    }

    #[tokio::test]
    async fn test_rejected_photo_clears_previous() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        flow.attach_photo(jpeg_with_gps(sighting(), 32, 32)).await.unwrap();

        let err = flow.attach_photo(b"not an image".to_vec()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedImage);
        assert!(flow.photo().is_none());
        assert!(flow.photo_error().is_some());
    }

    #[tokio::test]
    async fn test_submit_requires_name_and_photo() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);

        assert_eq!(flow.submit().await.unwrap_err().code, ErrorCode::ValidationError);
        flow.set_species_name("台灣藍鵲");
        assert_eq!(flow.submit().await.unwrap_err().code, ErrorCode::ValidationError);
        assert!(fake.calls_of(CallKind::Upload).is_empty());
    }

    #[tokio::test]
    async fn test_submit_uploads_then_inserts() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        flow.set_species_name(" 台灣藍鵲 ");
        flow.set_description("三隻在樹冠層");
        flow.attach_photo(jpeg_with_gps(sighting(), 64, 48)).await.unwrap();

        let receipt = flow.submit().await.unwrap();
        assert!(receipt.path.ends_with(".jpg"));
        assert!(receipt.image_url.ends_with(&receipt.path));
        assert_eq!(fake.objects(), vec![format!("{}/{}", tables::SPECIES_PHOTOS_BUCKET, receipt.path)]);

        let row = &fake.rows(tables::SPECIES_REPORTS)[0];
        assert_eq!(row["species_name"], "台灣藍鵲");
        assert_eq!(row["gps_location"], "25.033000, 121.565400");
        assert_eq!(row["reporter_nature_name"], "大冠鷲");
        assert_eq!(row["reporter_group"], "未設定");
        assert!(flow.success_visible());
        assert!(flow.photo().is_none());
    }

    #[tokio::test]
    async fn test_insert_failure_removes_upload() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        flow.set_species_name("台灣藍鵲");
        flow.attach_photo(jpeg_with_gps(sighting(), 32, 32)).await.unwrap();
        fake.fail_next(CallKind::Insert);

        assert!(flow.submit().await.is_err());
        assert!(fake.objects().is_empty());
        assert_eq!(fake.calls_of(CallKind::Remove).len(), 1);
        assert!(flow.orphans().is_empty());
        assert!(flow.photo().is_some());
    }

    #[tokio::test]
    async fn test_failed_cleanup_is_retried() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        flow.set_species_name("台灣藍鵲");
        flow.attach_photo(jpeg_with_gps(sighting(), 32, 32)).await.unwrap();
        fake.fail_next(CallKind::Insert);
        fake.fail_next(CallKind::Remove);

        assert!(flow.submit().await.is_err());
        assert_eq!(flow.orphans().len(), 1);
        assert_eq!(fake.objects().len(), 1);

        assert_eq!(flow.retry_orphan_cleanup().await, 0);
        assert!(fake.objects().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_is_upload_error() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        flow.set_species_name("台灣藍鵲");
        flow.attach_photo(jpeg_with_gps(sighting(), 32, 32)).await.unwrap();
        fake.fail_next(CallKind::Upload);

        assert_eq!(flow.submit().await.unwrap_err().code, ErrorCode::UploadFailed);
        assert!(fake.calls_of(CallKind::Insert).is_empty());
    }

    #[tokio::test]
    async fn test_sensor_and_manual_locations() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);

        flow.locate().await.unwrap();
        assert_eq!(flow.location().unwrap().1, CoordinateSource::Sensor);
        assert!(!flow.photo_badge_active());

        assert!(flow.set_location(Coordinate::new(95.0, 0.0)).is_err());
        flow.set_location(sighting()).unwrap();
        assert_eq!(flow.location().unwrap(), (sighting(), CoordinateSource::Manual));
    }

    #[tokio::test(start_paused = true)]
    async fn test_photo_badge_expires() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        flow.attach_photo(jpeg_with_gps(sighting(), 32, 32)).await.unwrap();
        assert!(flow.photo_badge_active());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!flow.photo_badge_active());
    }
}
