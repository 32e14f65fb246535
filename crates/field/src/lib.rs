//! Field flows for SOW volunteers.
//!
//! Each flow is a plain struct that owns its state and is driven through
//! `&mut self`. Backend access goes through an injected
//! [`Gateway`](sow_api_client::Gateway); device position through an injected
//! [`PositionSource`](position::PositionSource). Realtime and position
//! updates arrive on channels owned by RAII guards and are applied one at a
//! time by the flow that holds them.
//!
//! - [`checkin`]: proximity-gated site check-in
//! - [`report`]: species sightings with a compressed photo
//! - [`feedback`] and [`likes`]: daily prompts, live feed, optimistic likes
//! - [`species_wall`], [`leaderboard`], [`stats`], [`history`]: read views
//! - [`session`] and [`admin`]: sign-in, registration, profile and admin gate

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admin;
pub mod checkin;
pub mod feedback;
pub mod history;
pub mod leaderboard;
pub mod likes;
pub mod position;
pub mod report;
pub mod session;
pub mod species_wall;
pub mod stats;

mod rows;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use admin::{admin_sign_in, reset_password, AdminOutcome};
pub use checkin::{CheckinFlow, CheckinReceipt, CheckinState, SiteChoice};
pub use feedback::FeedbackFlow;
pub use likes::{Applied, FeedItem, LikeLog, LikeTarget, LiveWindow};
pub use position::{
    locate_once, FixedPosition, PositionError, PositionSample, PositionSource, PositionUpdate,
    PositionWatch, ScriptedPositions,
};
pub use report::{CoordinateSource, ReportFlow, ReportReceipt};
pub use session::{AuthListener, SessionContext, SessionState};
pub use species_wall::SpeciesWall;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::checkin::{CheckinFlow, CheckinState, SiteChoice};
    pub use crate::feedback::FeedbackFlow;
    pub use crate::position::{FixedPosition, PositionSource};
    pub use crate::report::ReportFlow;
    pub use crate::session::SessionContext;
    pub use crate::species_wall::SpeciesWall;
}
