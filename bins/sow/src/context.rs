//! Shared command context: configuration, backend, session and position.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sow_api_client::{Gateway, SupabaseGateway};
use sow_core::config::Config;
use sow_core::models::Profile;
use sow_core::Error;
use sow_field::{
    FixedPosition, PositionError, PositionSource, PositionUpdate, PositionWatch, SessionContext,
};
use sow_geo::{parse_coordinate_label, Coordinate};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a command needs besides its own arguments.
pub struct App {
    pub config: Config,
    pub json: bool,
    pub position: Option<Coordinate>,
}

impl App {
    /// Backend gateway from `SUPABASE_URL` / `SUPABASE_ANON_KEY`.
    pub fn gateway(&self) -> Result<Arc<dyn Gateway>> {
        let gateway = SupabaseGateway::from_env().map_err(Error::from)?;
        Ok(Arc::new(gateway))
    }

    /// Session restored from `SOW_ACCESS_TOKEN`, possibly signed out.
    pub async fn session(&self) -> Result<SessionContext> {
        let session = SessionContext::new(self.gateway()?);
        session.restore().await?;
        Ok(session)
    }

    /// Session that must be signed in, with its profile.
    pub async fn signed_in(&self) -> Result<(SessionContext, Profile)> {
        let session = self.session().await?;
        let profile = session.require_profile().map_err(|e| {
            e.with_suggestion("Run `sow login` and export the printed SOW_ACCESS_TOKEN")
        })?;
        Ok((session, profile))
    }

    /// Position source: the `--at` coordinate, or none at all.
    pub fn positions(&self) -> Arc<dyn PositionSource> {
        match self.position {
            Some(coordinate) => Arc::new(FixedPosition::new(coordinate)),
            None => Arc::new(NoPosition),
        }
    }

    /// Print a value as pretty JSON.
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Parse `"lat, lng"` as typed on the command line.
pub fn parse_coordinate(label: &str) -> Result<Coordinate> {
    let coordinate = parse_coordinate_label(label).map_err(|e| {
        Error::validation(e.to_string())
            .with_suggestion("Use decimal degrees, e.g. \"25.0330, 121.5654\"")
    })?;
    Ok(coordinate)
}

/// A terminal has no position sensor unless one is given with `--at`.
struct NoPosition;

fn no_position() -> PositionError {
    PositionError::Unavailable("no position given; pass --at \"lat, lng\"".to_string())
}

#[async_trait]
impl PositionSource for NoPosition {
    async fn current(&self) -> PositionUpdate {
        Err(no_position())
    }

    fn watch(&self) -> PositionWatch {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Err(no_position()));
        PositionWatch::new(rx, None)
    }
}
