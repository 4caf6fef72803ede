use log::{info, warn};
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::pipeline::Pipeline;
use crate::sensors::SensorSource;
use crate::session::{Session, SessionState};

/// Owns the current session and hands the inference pipeline from one
/// session to the next. Each start, including a resume, is a fresh session
/// with its counter at zero.
pub struct SessionController {
    config: SessionConfig,
    source: Arc<dyn SensorSource>,
    current: Option<Arc<Session>>,
    parked: Option<Pipeline>,
}

impl SessionController {
    pub fn new(config: SessionConfig, source: Arc<dyn SensorSource>, pipeline: Pipeline) -> Self {
        Self {
            config,
            source,
            current: None,
            parked: Some(pipeline),
        }
    }

    /// Start a new session. Fails with `AlreadyRunning` while one is sampling.
    pub fn start(&mut self) -> TrackerResult<Arc<Session>> {
        if let Some(session) = &self.current {
            if session.state()? == SessionState::Sampling {
                return Err(TrackerError::AlreadyRunning);
            }
        }
        self.reclaim();

        let pipeline = self
            .parked
            .take()
            .ok_or_else(|| TrackerError::Internal("inference pipeline unavailable".to_string()))?;
        let session = Session::new(self.config.clone(), Arc::clone(&self.source), pipeline)?;
        self.current = Some(Arc::clone(&session));
        session.start()?;

        info!("started {}", session.id());
        Ok(session)
    }

    /// Stop the sampling session; its results so far are kept.
    pub fn pause(&mut self) -> TrackerResult<()> {
        let session = self.current.as_ref().ok_or(TrackerError::NotRunning)?;
        if session.state()? != SessionState::Sampling {
            return Err(TrackerError::NotRunning);
        }
        session.stop()?;
        info!("paused {}", session.id());
        self.reclaim();
        Ok(())
    }

    /// Begin a fresh session after a pause or after the cap was reached.
    pub fn resume(&mut self) -> TrackerResult<Arc<Session>> {
        self.start()
    }

    /// Lifecycle state of the current session; `Idle` before the first start.
    pub fn state(&self) -> TrackerResult<SessionState> {
        match &self.current {
            Some(session) => session.state(),
            None => Ok(SessionState::Idle),
        }
    }

    pub fn current_session(&self) -> Option<&Arc<Session>> {
        self.current.as_ref()
    }

    // Pull the pipeline back out of a stopped session.
    fn reclaim(&mut self) {
        if self.parked.is_some() {
            return;
        }
        if let Some(session) = &self.current {
            if matches!(session.state(), Ok(SessionState::Stopped)) {
                session.wait();
                match session.take_pipeline() {
                    Some(pipeline) => self.parked = Some(pipeline),
                    None => warn!("{}: pipeline could not be recovered", session.id()),
                }
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(session) = &self.current {
            if matches!(session.state(), Ok(SessionState::Sampling)) {
                let _ = session.stop();
            }
        }
    }
}
