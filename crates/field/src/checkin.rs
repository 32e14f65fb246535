//! Proximity-gated check-in.
//!
//! ```text
//! Idle → Locating → Evaluating → Submittable | Blocked → Submitting → Success → Idle
//! ```
//!
//! A listed site opens the gate only while the latest position sample lies
//! within the configured radius of its fixed coordinates. The free-form site
//! opens the gate as soon as it has a label.

use crate::position::{locate_once, PositionSource, PositionUpdate, PositionWatch};
use crate::rows::decode_all;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sow_api_client::{Gateway, Query};
use sow_core::config::CheckinConfig;
use sow_core::models::{tables, Location, NewCheckin, Profile};
use sow_core::vocab::{free_form_location, UNSET};
use sow_core::{Error, Result};
use sow_geo::{haversine_distance, rank_by_distance, Coordinate, RankedSite};
use sow_telemetry::{metrics, names, Timer};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Site picked by the volunteer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteChoice {
    /// A site from the branch's list, by name
    Listed(String),
    /// Anywhere, described by a typed label
    FreeForm,
}

/// Where the flow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinState {
    /// Nothing selected
    Idle,
    /// Waiting for a usable position
    Locating,
    /// A sample is being compared with the site
    Evaluating,
    /// Check-in allowed
    Submittable,
    /// Too far away, or nothing to submit yet
    Blocked,
    /// Record being written
    Submitting,
    /// Written; confirmation showing
    Success,
}

/// A written check-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckinReceipt {
    /// Name stored on the record
    pub location_name: String,
    /// Distance when the gate opened, for listed sites
    pub distance_km: Option<f64>,
    /// Backend timestamp, when returned
    pub created_at: Option<DateTime<Utc>>,
}

/// Check-in flow for one signed-in volunteer.
pub struct CheckinFlow {
    gateway: Arc<dyn Gateway>,
    positions: Arc<dyn PositionSource>,
    profile: Profile,
    config: CheckinConfig,
    sites: Vec<Location>,
    selected: Option<SiteChoice>,
    target: Option<Coordinate>,
    label: String,
    distance_km: Option<f64>,
    still_locating: bool,
    watch: Option<PositionWatch>,
    state: CheckinState,
    confirmed_at: Option<Instant>,
}

impl CheckinFlow {
    /// Idle flow.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        positions: Arc<dyn PositionSource>,
        profile: Profile,
        config: CheckinConfig,
    ) -> Self {
        Self {
            gateway,
            positions,
            profile,
            config,
            sites: Vec::new(),
            selected: None,
            target: None,
            label: String::new(),
            distance_km: None,
            still_locating: false,
            watch: None,
            state: CheckinState::Idle,
            confirmed_at: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> CheckinState {
        self.state
    }

    /// Whether `submit` would be accepted.
    pub fn can_submit(&self) -> bool {
        self.state == CheckinState::Submittable
    }

    /// Distance to the selected site from the latest good sample.
    pub fn distance_km(&self) -> Option<f64> {
        self.distance_km
    }

    /// Set after a sampling error until the next good sample.
    pub fn is_still_locating(&self) -> bool {
        self.still_locating
    }

    /// Check-in radius in kilometres.
    pub fn radius_km(&self) -> f64 {
        self.config.radius_km
    }

    /// Selected site, if any.
    pub fn selected(&self) -> Option<&SiteChoice> {
        self.selected.as_ref()
    }

    /// Whether continuous sampling is running.
    pub fn has_active_watch(&self) -> bool {
        self.watch.is_some()
    }

    /// Sites available for selection.
    pub fn sites(&self) -> &[Location] {
        &self.sites
    }

    /// Use a known site list instead of loading it.
    pub fn set_sites(&mut self, sites: Vec<Location>) {
        self.sites = sites;
    }

    /// Fetch the volunteer's branch sites, ordered by name.
    pub async fn load_sites(&mut self) -> Result<&[Location]> {
        let mut query = Query::new().order_asc("location_name");
        let branch = self.profile.branch_or_unset();
        if branch != UNSET {
            query = query.eq("branch", branch);
        }
        let rows = self.gateway.query(tables::LOCATIONS, &query).await?;
        self.sites = decode_all(tables::LOCATIONS, rows);
        debug!(branch, sites = self.sites.len(), "Sites loaded");
        Ok(&self.sites)
    }

    /// Sites ordered by distance from `origin`, nearest first.
    pub fn nearest_sites(&self, origin: &Coordinate) -> Vec<RankedSite> {
        let sites: Vec<(String, Option<Coordinate>)> = self
            .sites
            .iter()
            .map(|site| {
                let coord = site.lat_lng().map(|(lat, lng)| Coordinate::new(lat, lng));
                (site.location_name.clone(), coord)
            })
            .collect();
        rank_by_distance(origin, &sites, None)
    }

    /// Select a site. A listed site starts continuous sampling (inside a
    /// tokio runtime); any previous watch is released first.
    pub fn select_site(&mut self, choice: SiteChoice) -> Result<CheckinState> {
        if self.state == CheckinState::Submitting {
            return Err(Error::invalid_state("A check-in is being submitted"));
        }

        let target = match &choice {
            SiteChoice::Listed(name) => {
                let site = self
                    .sites
                    .iter()
                    .find(|site| &site.location_name == name)
                    .ok_or_else(|| Error::not_found(format!("site {}", name)))?;
                Some(site.lat_lng().map(|(lat, lng)| Coordinate::new(lat, lng)))
            }
            SiteChoice::FreeForm => None,
        };

        self.release_watch();
        self.distance_km = None;
        self.still_locating = false;
        self.confirmed_at = None;
        self.target = target.flatten();

        self.state = match (&choice, target) {
            (SiteChoice::Listed(_), Some(Some(_))) => {
                self.watch = Some(self.positions.watch());
                CheckinState::Locating
            }
            (SiteChoice::Listed(name), _) => {
                warn!(site = %name, "Site has no coordinates; check-in stays blocked");
                CheckinState::Blocked
            }
            (SiteChoice::FreeForm, _) => self.free_form_gate(),
        };
        debug!(?choice, state = ?self.state, "Site selected");
        self.selected = Some(choice);
        Ok(self.state)
    }

    /// Label typed for the free-form site.
    pub fn free_form_label(&self) -> &str {
        &self.label
    }

    /// Set the free-form label; re-evaluates the gate when free-form is
    /// selected.
    pub fn set_free_form_label(&mut self, label: impl Into<String>) -> CheckinState {
        self.label = label.into();
        if self.selected == Some(SiteChoice::FreeForm)
            && matches!(self.state, CheckinState::Blocked | CheckinState::Submittable)
        {
            self.state = self.free_form_gate();
        }
        self.state
    }

    fn free_form_gate(&self) -> CheckinState {
        if self.label.trim().is_empty() {
            CheckinState::Blocked
        } else {
            CheckinState::Submittable
        }
    }

    /// Fold one position update into the gate.
    pub fn apply_sample(&mut self, update: PositionUpdate) -> CheckinState {
        let Some(target) = self.target else {
            return self.state;
        };
        if !matches!(
            self.state,
            CheckinState::Locating | CheckinState::Submittable | CheckinState::Blocked
        ) {
            return self.state;
        }

        match update {
            Ok(sample) => {
                self.state = CheckinState::Evaluating;
                let distance = haversine_distance(&sample.coordinate, &target);
                self.distance_km = Some(distance);
                self.still_locating = false;
                self.state = if distance <= self.config.radius_km {
                    CheckinState::Submittable
                } else {
                    CheckinState::Blocked
                };
                debug!(distance_km = distance, state = ?self.state, "Position sample evaluated");
            }
            Err(e) => {
                debug!(error = %e, "Position sample failed");
                self.distance_km = None;
                self.still_locating = true;
                self.state = CheckinState::Locating;
            }
        }
        self.state
    }

    /// Wait for the next watched sample and apply it. `None` when no watch
    /// is running or the sampler stopped.
    pub async fn next_sample(&mut self) -> Option<CheckinState> {
        let update = self.watch.as_mut()?.next().await?;
        Some(self.apply_sample(update))
    }

    /// Apply every sample already delivered.
    pub fn pump(&mut self) -> CheckinState {
        while let Some(update) = self.watch.as_mut().and_then(PositionWatch::try_next) {
            self.apply_sample(update);
        }
        self.state
    }

    /// Single-shot mode: one sample with the configured timeout, gated the
    /// same way as watched samples.
    pub async fn check_once(&mut self) -> Result<CheckinState> {
        if self.target.is_none() {
            return Ok(self.state);
        }
        let timeout = Duration::from_secs(self.config.locate_timeout_secs);
        let update = locate_once(self.positions.as_ref(), timeout).await;
        let failure = update.as_ref().err().cloned();
        let state = self.apply_sample(update);
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(state),
        }
    }

    /// Write the check-in. Only accepted while submittable; a failed write
    /// leaves the flow submittable.
    #[instrument(skip(self), fields(user_id = %self.profile.id))]
    pub async fn submit(&mut self) -> Result<CheckinReceipt> {
        if self.state != CheckinState::Submittable {
            metrics().increment(names::CHECKIN_BLOCKED);
            return Err(match (self.state, self.distance_km) {
                (CheckinState::Blocked, Some(d)) => Error::out_of_range(d, self.config.radius_km),
                (CheckinState::Locating, _) => {
                    Error::location_unavailable("Still waiting for a position fix")
                }
                (state, _) => Error::invalid_state(format!("Cannot check in while {:?}", state)),
            });
        }

        let location_name = match &self.selected {
            Some(SiteChoice::Listed(name)) => name.clone(),
            Some(SiteChoice::FreeForm) => free_form_location(self.label.trim()),
            None => return Err(Error::invalid_state("No site selected")),
        };
        let record = NewCheckin {
            user_id: self.profile.id.clone(),
            location_name: location_name.clone(),
            branch: self.profile.branch_or_unset().to_string(),
            volunteer_group: self.profile.group_or_unset().to_string(),
        };
        let record = serde_json::to_value(&record)?;

        self.state = CheckinState::Submitting;
        let timer = Timer::start(names::GATEWAY_CALL_MS);
        let result = self.gateway.insert(tables::CHECKIN_RECORDS, record).await;
        timer.stop();

        match result {
            Ok(row) => {
                self.state = CheckinState::Success;
                self.confirmed_at = Some(Instant::now());
                metrics().increment(names::CHECKIN_SUBMITTED);
                info!(location = %location_name, distance_km = ?self.distance_km, "Checked in");
                Ok(CheckinReceipt {
                    location_name,
                    distance_km: self.distance_km,
                    created_at: row
                        .get("created_at")
                        .and_then(|v| serde_json::from_value(v.clone()).ok()),
                })
            }
            Err(e) => {
                self.state = CheckinState::Submittable;
                metrics().increment(names::CHECKIN_FAILED);
                warn!(location = %location_name, error = %e, "Check-in write failed");
                Err(Error::from(e).with_context(format!("Check-in at {}", location_name)))
            }
        }
    }

    /// Time left on the success confirmation.
    pub fn confirmation_remaining(&self) -> Option<Duration> {
        let shown = self.confirmed_at?.elapsed();
        Some(self.confirmation_window().saturating_sub(shown))
    }

    fn confirmation_window(&self) -> Duration {
        Duration::from_secs(self.config.confirmation_secs)
    }

    /// Reset once the confirmation has been shown long enough.
    pub fn tick(&mut self) -> CheckinState {
        if self.state == CheckinState::Success
            && self.confirmation_remaining().is_some_and(|left| left.is_zero())
        {
            self.reset();
        }
        self.state
    }

    /// Show the confirmation for its full window, then reset.
    pub async fn finish_confirmation(&mut self) {
        if let Some(left) = self.confirmation_remaining() {
            tokio::time::sleep(left).await;
        }
        self.reset();
    }

    /// Clear selection, distance and label, and release the watch.
    pub fn reset(&mut self) {
        self.release_watch();
        self.selected = None;
        self.target = None;
        self.label.clear();
        self.distance_km = None;
        self.still_locating = false;
        self.confirmed_at = None;
        self.state = CheckinState::Idle;
    }

    fn release_watch(&mut self) {
        self.watch = None;
    }
}
