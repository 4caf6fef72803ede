use chrono::Utc;
use crossbeam::channel::{bounded, select, tick, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::SessionConfig;
use crate::error::{lock_error, TrackerError, TrackerResult};
use crate::fusion_buffer::{FrameAssembler, FusionFrame};
use crate::pipeline::Pipeline;
use crate::sensors::{SampleSender, SensorSource};
use crate::types::{SensorChannel, SensorSample};

/// Disambiguates sessions created within the same millisecond.
static SESSION_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, sensors not yet subscribed
    Idle,
    /// Sensors subscribed, frames being classified
    Sampling,
    /// Cap reached or stopped explicitly; terminal
    Stopped,
}

/// Session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub start_time: String,
    pub state: SessionState,
    pub frames_completed: u32,
    pub accel_sample_count: u32,
    pub gyro_sample_count: u32,
    pub mag_sample_count: u32,
    pub frames_dropped: u32,
    pub inference_failures: u32,
}

impl SessionMetadata {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            start_time: Utc::now().to_rfc3339(),
            state: SessionState::Idle,
            frames_completed: 0,
            accel_sample_count: 0,
            gyro_sample_count: 0,
            mag_sample_count: 0,
            frames_dropped: 0,
            inference_failures: 0,
        }
    }

    fn count_sample(&mut self, channel: SensorChannel) {
        match channel {
            SensorChannel::Accel => self.accel_sample_count += 1,
            SensorChannel::Gyro => self.gyro_sample_count += 1,
            SensorChannel::Mag => self.mag_sample_count += 1,
        }
    }
}

/// What became of one delivered sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Session not sampling; sample discarded.
    Ignored,
    /// Stored; frame still incomplete.
    Buffered,
    /// Completed a frame that was queued for inference.
    Dispatched { sequence: u32 },
    /// Completed a frame that could not be queued.
    Dropped { sequence: u32 },
}

struct FrameJob {
    sequence: u32,
    frame: FusionFrame,
}

/// Everything guarded by the session's single lock.
struct SessionCore {
    metadata: SessionMetadata,
    assembler: FrameAssembler,
    frames: Option<Sender<FrameJob>>,
}

/// A stop signal (dropped to fire) and the thread it controls.
type StoppableThread = (Sender<()>, JoinHandle<()>);

#[derive(Default)]
struct Workers {
    scheduler: Option<StoppableThread>,
    pump: Option<StoppableThread>,
    worker: Option<JoinHandle<Pipeline>>,
}

/// One bounded run of sampling, from start to the measurement cap or an
/// explicit stop.
pub struct Session {
    id: String,
    config: SessionConfig,
    source: Arc<dyn SensorSource>,
    core: Arc<Mutex<SessionCore>>,
    workers: Mutex<Workers>,
    pipeline: Mutex<Option<Pipeline>>,
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Session");
        out.field("id", &self.id);
        match self.core.try_lock() {
            Ok(core) => out
                .field("state", &core.metadata.state)
                .field("frames_completed", &core.metadata.frames_completed),
            Err(_) => out.field("state", &"<locked>"),
        };
        out.finish()
    }
}

impl Session {
    /// Create a new session in Idle state
    pub fn new(
        config: SessionConfig,
        source: Arc<dyn SensorSource>,
        pipeline: Pipeline,
    ) -> TrackerResult<Arc<Self>> {
        config.validate()?;

        let id = format!(
            "session_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S_%3f"),
            SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let core = SessionCore {
            metadata: SessionMetadata::new(id.clone()),
            assembler: FrameAssembler::new(),
            frames: None,
        };
        let (done_tx, done_rx) = bounded(0);

        Ok(Arc::new(Session {
            id,
            config,
            source,
            core: Arc::new(Mutex::new(core)),
            workers: Mutex::new(Workers::default()),
            pipeline: Mutex::new(Some(pipeline)),
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Transition Idle → Sampling: start the inference worker and the sample
    /// pump, subscribe all channels, then arm the re-subscription timer.
    pub fn start(self: &Arc<Self>) -> TrackerResult<()> {
        let mut workers = self.workers.lock().map_err(lock_error("session workers"))?;

        let (pipeline, frame_rx) = {
            let mut core = self.core.lock().map_err(lock_error("session"))?;
            match core.metadata.state {
                SessionState::Idle => {}
                SessionState::Sampling => return Err(TrackerError::AlreadyRunning),
                SessionState::Stopped => {
                    return Err(TrackerError::InvalidState(
                        "stopped sessions cannot be restarted".to_string(),
                    ))
                }
            }
            let pipeline = self
                .pipeline
                .lock()
                .map_err(lock_error("pipeline"))?
                .take()
                .ok_or_else(|| TrackerError::Internal("inference pipeline missing".to_string()))?;

            let (frame_tx, frame_rx) = bounded(self.config.frame_queue_depth);
            core.frames = Some(frame_tx);
            core.metadata.state = SessionState::Sampling;
            (pipeline, frame_rx)
        };
        info!("{}: sampling (cap {})", self.id, self.config.measurement_cap);

        let result = self.spawn_threads(&mut workers, pipeline, frame_rx);
        drop(workers);

        if let Err(e) = result {
            warn!("{}: failed to start: {}", self.id, e);
            let _ = self.stop();
            return Err(e);
        }
        Ok(())
    }

    fn spawn_threads(
        self: &Arc<Self>,
        workers: &mut Workers,
        pipeline: Pipeline,
        frame_rx: Receiver<FrameJob>,
    ) -> TrackerResult<()> {
        let core = Arc::clone(&self.core);
        let id = self.id.clone();
        workers.worker = Some(spawn_named("har-inference", move || {
            run_worker(pipeline, frame_rx, core, id)
        })?);

        let (sample_tx, sample_rx) = bounded(self.config.sample_queue_depth);

        let (pump_stop_tx, pump_stop_rx) = bounded::<()>(0);
        let session = Arc::clone(self);
        let pump = spawn_named("har-sensor-pump", move || {
            run_pump(session, sample_rx, pump_stop_rx)
        })?;
        workers.pump = Some((pump_stop_tx, pump));

        rearm(&self.core, self.source.as_ref(), &sample_tx);

        let (sched_stop_tx, sched_stop_rx) = bounded::<()>(0);
        let core = Arc::clone(&self.core);
        let source = Arc::clone(&self.source);
        let interval = self.config.rearm_interval;
        let scheduler = spawn_named("har-scheduler", move || {
            run_scheduler(core, source, sample_tx, interval, sched_stop_rx)
        })?;
        workers.scheduler = Some((sched_stop_tx, scheduler));

        Ok(())
    }

    /// Feed one sensor sample. Safe to call from any thread.
    ///
    /// Reaching the measurement cap stops the session before this returns.
    pub fn on_sample(&self, sample: SensorSample) -> TrackerResult<SampleOutcome> {
        let (outcome, cap_reached) = {
            let mut core = self.core.lock().map_err(lock_error("session"))?;
            if core.metadata.state != SessionState::Sampling {
                return Ok(SampleOutcome::Ignored);
            }

            core.metadata.count_sample(sample.channel);
            let Some(frame) = core.assembler.update(sample) else {
                return Ok(SampleOutcome::Buffered);
            };

            core.metadata.frames_completed += 1;
            let sequence = core.metadata.frames_completed;
            let queued = match core.frames.as_ref() {
                Some(tx) => tx.try_send(FrameJob { sequence, frame }),
                None => Err(TrySendError::Disconnected(FrameJob { sequence, frame })),
            };

            let outcome = match queued {
                Ok(()) => {
                    debug!("{}: frame #{} queued", self.id, sequence);
                    SampleOutcome::Dispatched { sequence }
                }
                Err(e) => {
                    core.metadata.frames_dropped += 1;
                    let reason = if e.is_full() { "worker busy" } else { "worker gone" };
                    warn!("{}: frame #{} dropped ({})", self.id, sequence, reason);
                    SampleOutcome::Dropped { sequence }
                }
            };

            let cap_reached = sequence >= self.config.measurement_cap;
            if cap_reached {
                core.metadata.state = SessionState::Stopped;
                core.frames = None;
            }
            (outcome, cap_reached)
        };

        if cap_reached {
            info!("{}: measurement cap reached", self.id);
            self.shutdown();
        }
        Ok(outcome)
    }

    /// Transition Sampling → Stopped. Returns once shutdown has finished,
    /// including when another thread (or the cap) initiated it.
    pub fn stop(&self) -> TrackerResult<()> {
        let initiated = {
            let mut core = self.core.lock().map_err(lock_error("session"))?;
            match core.metadata.state {
                SessionState::Idle => return Err(TrackerError::NotRunning),
                SessionState::Stopped => false,
                SessionState::Sampling => {
                    core.metadata.state = SessionState::Stopped;
                    core.frames = None;
                    true
                }
            }
        };

        if initiated {
            info!("{}: stop requested", self.id);
            self.shutdown();
        } else {
            self.wait();
        }
        Ok(())
    }

    // Ordered teardown: unsubscribe → cancel timer → stop pump → drain worker
    // (sinks finish there). The caller has already set Stopped and dropped
    // the frame sender.
    fn shutdown(&self) {
        self.source.unregister_all();

        let mut workers = match self.workers.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some((stop, handle)) = workers.scheduler.take() {
            drop(stop);
            if handle.join().is_err() {
                warn!("{}: scheduler thread panicked", self.id);
            }
        }

        if let Some((stop, handle)) = workers.pump.take() {
            drop(stop);
            // A cap reached on the pump thread lands here; it exits on return.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("{}: sensor pump panicked", self.id);
            }
        }

        if let Some(handle) = workers.worker.take() {
            match handle.join() {
                Ok(pipeline) => {
                    if let Ok(mut slot) = self.pipeline.lock() {
                        *slot = Some(pipeline);
                    }
                }
                Err(_) => warn!("{}: inference worker panicked", self.id),
            }
        }
        drop(workers);

        if let Ok(meta) = self.metadata() {
            info!(
                "{}: stopped after {} frames ({} dropped, {} failed)",
                self.id, meta.frames_completed, meta.frames_dropped, meta.inference_failures
            );
        }
        if let Ok(mut done) = self.done_tx.lock() {
            done.take();
        }
    }

    /// Block until the session has fully stopped.
    pub fn wait(&self) {
        let _ = self.done_rx.recv();
    }

    /// Block up to `timeout` for the session to fully stop.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        !matches!(self.done_rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }

    /// Hand the pipeline back once the session has fully stopped.
    pub fn take_pipeline(&self) -> Option<Pipeline> {
        self.pipeline.lock().ok()?.take()
    }

    pub fn state(&self) -> TrackerResult<SessionState> {
        let core = self.core.lock().map_err(lock_error("session"))?;
        Ok(core.metadata.state)
    }

    pub fn is_sampling(&self) -> TrackerResult<bool> {
        Ok(self.state()? == SessionState::Sampling)
    }

    pub fn frames_completed(&self) -> TrackerResult<u32> {
        let core = self.core.lock().map_err(lock_error("session"))?;
        Ok(core.metadata.frames_completed)
    }

    /// Get metadata snapshot
    pub fn metadata(&self) -> TrackerResult<SessionMetadata> {
        let core = self.core.lock().map_err(lock_error("session"))?;
        Ok(core.metadata.clone())
    }

    /// Channels holding a sample for the frame being assembled.
    pub fn pending_channels(&self) -> TrackerResult<Vec<SensorChannel>> {
        let core = self.core.lock().map_err(lock_error("session"))?;
        Ok(core.assembler.pending())
    }
}

fn spawn_named<F, T>(name: &str, f: F) -> TrackerResult<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| TrackerError::Internal(format!("failed to spawn {}: {}", name, e)))
}

/// (Re)subscribe every channel while the session is sampling. The state check
/// and the registration happen under the session lock so a concurrent stop
/// cannot be followed by a late re-subscription.
fn rearm(core: &Mutex<SessionCore>, source: &dyn SensorSource, sink: &SampleSender) {
    let Ok(core) = core.lock() else { return };
    if core.metadata.state != SessionState::Sampling {
        return;
    }
    for channel in SensorChannel::ALL {
        if let Err(e) = source.register(channel, sink.clone()) {
            warn!("[{}] subscription failed: {}", channel, e);
        }
    }
}

fn run_scheduler(
    core: Arc<Mutex<SessionCore>>,
    source: Arc<dyn SensorSource>,
    sink: SampleSender,
    interval: Duration,
    stop: Receiver<()>,
) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => rearm(&core, source.as_ref(), &sink),
            recv(stop) -> _ => break,
        }
    }
}

fn run_pump(session: Arc<Session>, samples: Receiver<SensorSample>, stop: Receiver<()>) {
    loop {
        select! {
            recv(samples) -> msg => match msg {
                Ok(sample) => {
                    if let Err(e) = session.on_sample(sample) {
                        warn!("{}: sample rejected: {}", session.id, e);
                    }
                }
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
}

fn run_worker(
    mut pipeline: Pipeline,
    frames: Receiver<FrameJob>,
    core: Arc<Mutex<SessionCore>>,
    session_id: String,
) -> Pipeline {
    pipeline.begin(&session_id);
    for job in frames.iter() {
        match pipeline.process(job.sequence, job.frame) {
            Ok(report) => pipeline.publish(&report),
            Err(e) => {
                warn!("{}: frame #{} skipped: {}", session_id, job.sequence, e);
                if let Ok(mut core) = core.lock() {
                    core.metadata.inference_failures += 1;
                }
            }
        }
    }
    pipeline.finish();
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::HistorySink;
    use crate::inference::InferenceEngine;
    use crate::testing::{
        feed_frame, EventLog, FixedClassifier, FlakyClassifier, LoggingSink, RecordingSource,
    };

    fn test_config(cap: u32) -> SessionConfig {
        SessionConfig {
            rearm_interval: Duration::from_millis(20),
            measurement_cap: cap,
            sample_queue_depth: 64,
            frame_queue_depth: 256,
        }
    }

    fn session_with(cap: u32, source: Arc<RecordingSource>, history: &HistorySink) -> Arc<Session> {
        let engine = InferenceEngine::new(Box::new(FixedClassifier::uniform()));
        let pipeline = Pipeline::new(engine).with_sink(Box::new(history.clone()));
        Session::new(test_config(cap), source, pipeline).unwrap()
    }

    #[test]
    fn test_session_state_transitions() {
        let source = Arc::new(RecordingSource::new());
        let history = HistorySink::new();
        let session = session_with(100, Arc::clone(&source), &history);

        // Initial state is Idle
        assert_eq!(session.state().unwrap(), SessionState::Idle);
        assert_eq!(session.stop().unwrap_err(), TrackerError::NotRunning);

        // Idle → Sampling subscribes all three channels right away
        session.start().unwrap();
        assert!(session.is_sampling().unwrap());
        assert!(source.registered_channels().len() >= 3);
        assert_eq!(session.start().unwrap_err(), TrackerError::AlreadyRunning);

        // Sampling → Stopped
        session.stop().unwrap();
        assert_eq!(session.state().unwrap(), SessionState::Stopped);
        assert!(source.unregister_count() >= 1);

        // Stopped is terminal
        assert!(matches!(session.start(), Err(TrackerError::InvalidState(_))));
        assert!(session.stop().is_ok());
        assert!(session.take_pipeline().is_some());
    }

    #[test]
    fn test_partial_frames_only_buffer() {
        let source = Arc::new(RecordingSource::new());
        let history = HistorySink::new();
        let session = session_with(100, source, &history);

        let early = session
            .on_sample(SensorSample::new(SensorChannel::Accel, 0.0, 0.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(early, SampleOutcome::Ignored);

        session.start().unwrap();
        for _ in 0..5 {
            let outcome = session
                .on_sample(SensorSample::new(SensorChannel::Gyro, 1.0, 0.0, 0.0, 0.0))
                .unwrap();
            assert_eq!(outcome, SampleOutcome::Buffered);
        }
        let outcome = session
            .on_sample(SensorSample::new(SensorChannel::Mag, 1.0, 0.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(outcome, SampleOutcome::Buffered);
        assert_eq!(session.frames_completed().unwrap(), 0);
        assert_eq!(
            session.pending_channels().unwrap(),
            vec![SensorChannel::Gyro, SensorChannel::Mag]
        );

        let outcome = session
            .on_sample(SensorSample::new(SensorChannel::Accel, 9.81, 0.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(outcome, SampleOutcome::Dispatched { sequence: 1 });
        assert!(session.pending_channels().unwrap().is_empty());

        session.stop().unwrap();
        let meta = session.metadata().unwrap();
        assert_eq!(meta.gyro_sample_count, 5);
        assert_eq!(meta.accel_sample_count, 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_stops_exactly_at_cap() {
        let source = Arc::new(RecordingSource::new());
        let history = HistorySink::new();
        let session = session_with(100, Arc::clone(&source), &history);
        session.start().unwrap();

        for i in 1..100 {
            assert_eq!(
                feed_frame(&session),
                SampleOutcome::Dispatched { sequence: i }
            );
            assert_eq!(session.state().unwrap(), SessionState::Sampling);
        }
        assert_eq!(feed_frame(&session), SampleOutcome::Dispatched { sequence: 100 });
        assert_eq!(session.state().unwrap(), SessionState::Stopped);
        assert!(session.wait_stopped(Duration::from_secs(5)));

        // Every dispatched frame was classified before the sinks closed.
        assert_eq!(history.len(), 100);
        assert_eq!(history.reports()[99].sequence, 100);
        assert_eq!(feed_frame(&session), SampleOutcome::Ignored);
        assert_eq!(session.frames_completed().unwrap(), 100);
        assert!(source.unregister_count() >= 1);
    }

    #[test]
    fn test_concurrent_channels_stop_exactly_at_cap() {
        let source = Arc::new(RecordingSource::new());
        let history = HistorySink::new();
        let session = session_with(100, source, &history);
        session.start().unwrap();

        let handles: Vec<_> = SensorChannel::ALL
            .iter()
            .map(|&channel| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    let mut sent = 0u32;
                    loop {
                        let sample = SensorSample::new(channel, sent as f32, 0.0, 0.0, 0.0);
                        if session.on_sample(sample).unwrap() == SampleOutcome::Ignored {
                            break sent;
                        }
                        sent += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap() >= 100);
        }

        assert!(session.wait_stopped(Duration::from_secs(5)));
        let meta = session.metadata().unwrap();
        assert_eq!(meta.state, SessionState::Stopped);
        assert_eq!(meta.frames_completed, 100);
        assert_eq!(meta.frames_dropped, 0);

        let sequences: Vec<u32> = history.reports().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, (1..=100).collect::<Vec<u32>>());
    }

    #[test]
    fn test_ids_are_unique_and_debug_shows_state() {
        let history = HistorySink::new();
        let a = session_with(100, Arc::new(RecordingSource::new()), &history);
        let b = session_with(100, Arc::new(RecordingSource::new()), &history);
        assert_ne!(a.id(), b.id());

        let shown = format!("{:?}", a);
        assert!(shown.contains(a.id()));
        assert!(shown.contains("Idle"));
    }

    #[test]
    fn test_samples_flow_through_registered_channel() {
        let source = Arc::new(RecordingSource::new());
        let history = HistorySink::new();
        let session = session_with(2, Arc::clone(&source), &history);
        session.start().unwrap();

        for _ in 0..2 {
            for channel in SensorChannel::ALL {
                source.emit(SensorSample::new(channel, 1.0, 2.0, 3.0, 0.0));
            }
        }

        assert!(session.wait_stopped(Duration::from_secs(5)));
        assert_eq!(session.state().unwrap(), SessionState::Stopped);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_inference_failure_skips_only_that_frame() {
        let source = Arc::new(RecordingSource::new());
        let history = HistorySink::new();
        let engine = InferenceEngine::new(Box::new(FlakyClassifier::failing_every(2)));
        let pipeline = Pipeline::new(engine).with_sink(Box::new(history.clone()));
        let session = Session::new(test_config(6), source, pipeline).unwrap();
        session.start().unwrap();

        for _ in 0..6 {
            feed_frame(&session);
        }
        assert!(session.wait_stopped(Duration::from_secs(5)));

        let meta = session.metadata().unwrap();
        assert_eq!(meta.frames_completed, 6);
        assert_eq!(meta.inference_failures, 3);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_shutdown_unsubscribes_before_sinks_close() {
        let log = EventLog::new();
        let source = Arc::new(RecordingSource::with_log(log.clone()));
        let engine = InferenceEngine::new(Box::new(FixedClassifier::uniform()));
        let pipeline = Pipeline::new(engine).with_sink(Box::new(LoggingSink::new(log.clone())));
        let session = Session::new(test_config(100), source, pipeline).unwrap();

        session.start().unwrap();
        feed_frame(&session);
        session.stop().unwrap();

        let events = log.events();
        let unsubscribed = events.iter().position(|e| e == "unregister").unwrap();
        let recorded = events.iter().position(|e| e == "record").unwrap();
        let finished = events.iter().position(|e| e == "finish").unwrap();
        assert!(recorded < finished);
        assert!(unsubscribed < finished);
        assert_eq!(events.iter().filter(|e| *e == "finish").count(), 1);
    }

    #[test]
    fn test_scheduler_rearms_subscriptions() {
        let source = Arc::new(RecordingSource::new());
        let history = HistorySink::new();
        let session = session_with(100, Arc::clone(&source), &history);
        session.start().unwrap();

        thread::sleep(Duration::from_millis(150));
        session.stop().unwrap();

        let after_stop = source.registered_channels().len();
        assert!(after_stop > 3, "only {} registrations", after_stop);

        thread::sleep(Duration::from_millis(60));
        assert_eq!(source.registered_channels().len(), after_stop);
    }

    #[test]
    fn test_full_frame_queue_drops_frame_and_continues() {
        let source = Arc::new(RecordingSource::new());
        let history = HistorySink::new();
        let slow = FixedClassifier::uniform().with_delay(Duration::from_millis(50));
        let engine = InferenceEngine::new(Box::new(slow));
        let pipeline = Pipeline::new(engine).with_sink(Box::new(history.clone()));
        let config = SessionConfig {
            frame_queue_depth: 1,
            ..test_config(100)
        };
        let session = Session::new(config, source, pipeline).unwrap();
        session.start().unwrap();

        let outcomes: Vec<SampleOutcome> = (0..5).map(|_| feed_frame(&session)).collect();
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, SampleOutcome::Dropped { .. })));
        assert!(session.is_sampling().unwrap());

        session.stop().unwrap();
        let meta = session.metadata().unwrap();
        assert_eq!(meta.frames_completed, 5);
        assert!(meta.frames_dropped >= 1);
        assert_eq!(history.len() as u32 + meta.frames_dropped, 5);
    }
}
