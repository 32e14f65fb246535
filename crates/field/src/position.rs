//! Device position sampling.
//!
//! A [`PositionSource`] answers single-shot requests and hands out
//! [`PositionWatch`] guards for continuous sampling. A watch owns the task
//! feeding it; dropping the watch stops sampling.

use async_trait::async_trait;
use sow_core::{Error, ErrorCode};
use sow_geo::Coordinate;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const WATCH_BUFFER: usize = 16;

/// One position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    /// Reported position
    pub coordinate: Coordinate,
    /// Horizontal accuracy in metres, when known
    pub accuracy_m: Option<f64>,
}

impl PositionSample {
    /// A sample without accuracy information.
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            accuracy_m: None,
        }
    }
}

/// Why a fix could not be obtained.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    /// The user refused location access
    #[error("Location permission denied")]
    PermissionDenied,

    /// No fix available from the device
    #[error("Position unavailable: {0}")]
    Unavailable(String),

    /// No fix within the allowed time
    #[error("No position fix within {0:?}")]
    Timeout(Duration),
}

impl From<PositionError> for Error {
    fn from(err: PositionError) -> Self {
        match err {
            PositionError::PermissionDenied => Error::new(
                ErrorCode::LocationPermissionDenied,
                "Location permission denied",
            )
            .with_suggestion("Allow location access, or choose the free-form site"),
            PositionError::Unavailable(reason) => Error::location_unavailable(reason),
            PositionError::Timeout(limit) => Error::location_timeout(limit.as_secs()),
        }
    }
}

/// Result of one sampling attempt.
pub type PositionUpdate = std::result::Result<PositionSample, PositionError>;

/// Source of device positions.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// One fix, as soon as the device has it.
    async fn current(&self) -> PositionUpdate;

    /// Start continuous sampling. Must be called inside a tokio runtime.
    fn watch(&self) -> PositionWatch;
}

/// Continuous sampling handle. Dropping it stops the sampler.
pub struct PositionWatch {
    updates: mpsc::Receiver<PositionUpdate>,
    task: Option<JoinHandle<()>>,
}

impl PositionWatch {
    /// Wrap a receiver, optionally owning the task that feeds it.
    pub fn new(updates: mpsc::Receiver<PositionUpdate>, task: Option<JoinHandle<()>>) -> Self {
        Self { updates, task }
    }

    /// Wait for the next update. `None` once the sampler has stopped.
    pub async fn next(&mut self) -> Option<PositionUpdate> {
        self.updates.recv().await
    }

    /// Take an already-delivered update without waiting.
    pub fn try_next(&mut self) -> Option<PositionUpdate> {
        self.updates.try_recv().ok()
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Position watch released");
        }
    }
}

impl std::fmt::Debug for PositionWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionWatch")
            .field("owns_task", &self.task.is_some())
            .finish()
    }
}

/// Single-shot fix with a deadline.
pub async fn locate_once(source: &dyn PositionSource, timeout: Duration) -> PositionUpdate {
    match tokio::time::timeout(timeout, source.current()).await {
        Ok(update) => update,
        Err(_) => Err(PositionError::Timeout(timeout)),
    }
}

/// A device that never moves, e.g. a position given on the command line.
#[derive(Debug, Clone)]
pub struct FixedPosition {
    sample: PositionSample,
    interval: Duration,
}

impl FixedPosition {
    /// Report `coordinate` once per second while watched.
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            sample: PositionSample::at(coordinate),
            interval: Duration::from_secs(1),
        }
    }

    /// Change the watch interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current(&self) -> PositionUpdate {
        Ok(self.sample)
    }

    fn watch(&self) -> PositionWatch {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let sample = self.sample;
        let interval = self.interval;
        let task = tokio::spawn(async move {
            loop {
                if tx.send(Ok(sample)).await.is_err() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
        PositionWatch::new(rx, Some(task))
    }
}

/// Replays a fixed list of updates; the watch ends after the last one.
#[derive(Debug, Clone)]
pub struct ScriptedPositions {
    script: Vec<PositionUpdate>,
    interval: Duration,
}

impl ScriptedPositions {
    /// Replay `script` with no delay between updates.
    pub fn new(script: Vec<PositionUpdate>) -> Self {
        Self {
            script,
            interval: Duration::ZERO,
        }
    }

    /// A source whose every request fails with `err`.
    pub fn failing(err: PositionError) -> Self {
        Self::new(vec![Err(err)])
    }

    /// Delay between replayed updates.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait]
impl PositionSource for ScriptedPositions {
    async fn current(&self) -> PositionUpdate {
        self.script
            .first()
            .cloned()
            .unwrap_or_else(|| Err(PositionError::Unavailable("no samples".into())))
    }

    fn watch(&self) -> PositionWatch {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let script = self.script.clone();
        let interval = self.interval;
        let task = tokio::spawn(async move {
            for update in script {
                if tx.send(update).await.is_err() {
                    return;
                }
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
            }
        });
        PositionWatch::new(rx, Some(task))
    }
}

/// A device that takes forever to answer.
#[cfg(test)]
pub(crate) struct SilentPosition;

#[cfg(test)]
#[async_trait]
impl PositionSource for SilentPosition {
    async fn current(&self) -> PositionUpdate {
        std::future::pending().await
    }

    fn watch(&self) -> PositionWatch {
        let (_tx, rx) = mpsc::channel(1);
        PositionWatch::new(rx, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taipei() -> Coordinate {
        Coordinate::new(25.0330, 121.5654)
    }

    #[tokio::test]
    async fn test_fixed_position_current() {
        let source = FixedPosition::new(taipei());
        let sample = source.current().await.unwrap();
        assert_eq!(sample.coordinate, taipei());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_position_watch_repeats() {
        let source = FixedPosition::new(taipei()).with_interval(Duration::from_millis(100));
        let mut watch = source.watch();
        for _ in 0..3 {
            assert!(watch.next().await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_scripted_watch_ends_after_script() {
        let source = ScriptedPositions::new(vec![
            Ok(PositionSample::at(taipei())),
            Err(PositionError::PermissionDenied),
        ]);
        let mut watch = source.watch();
        assert!(watch.next().await.unwrap().is_ok());
        assert_eq!(watch.next().await.unwrap(), Err(PositionError::PermissionDenied));
        assert!(watch.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_locate_once_times_out() {
        let result = locate_once(&SilentPosition, Duration::from_secs(10)).await;
        assert_eq!(result, Err(PositionError::Timeout(Duration::from_secs(10))));
    }

    #[tokio::test]
    async fn test_dropping_watch_stops_sampler() {
        let (tx, rx) = mpsc::channel::<PositionUpdate>(1);
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _done = done_tx;
            let _tx = tx;
            std::future::pending::<()>().await;
        });

        drop(PositionWatch::new(rx, Some(task)));
        assert!(done_rx.await.is_err());
    }

    #[test]
    fn test_position_error_codes() {
        let err: Error = PositionError::PermissionDenied.into();
        assert_eq!(err.code, ErrorCode::LocationPermissionDenied);

        let err: Error = PositionError::Timeout(Duration::from_secs(10)).into();
        assert_eq!(err.code, ErrorCode::LocationTimeout);
        assert!(err.is_location());
    }
}
