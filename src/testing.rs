//! Shared fakes for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{TrackerError, TrackerResult};
use crate::export::ResultSink;
use crate::fusion_buffer::FusionFrame;
use crate::inference::{Classifier, Logits};
use crate::pipeline::FrameReport;
use crate::sensors::{SampleSender, SensorSource};
use crate::session::{SampleOutcome, Session};
use crate::types::{SensorChannel, SensorSample};

/// Frame with accel `(accel_x, 0, 0)` m/s², gyro `(gyro_x, 0, 0)` rad/s and a
/// zero magnetometer reading.
pub fn frame(accel_x: f32, gyro_x: f32) -> FusionFrame {
    FusionFrame::new(
        SensorSample::new(SensorChannel::Accel, accel_x, 0.0, 0.0, 1.0),
        SensorSample::new(SensorChannel::Gyro, gyro_x, 0.0, 0.0, 1.0),
        SensorSample::new(SensorChannel::Mag, 0.0, 0.0, 0.0, 1.0),
    )
    .unwrap()
}

/// Deliver one sample per channel; returns the outcome of the last one.
pub fn feed_frame(session: &Session) -> SampleOutcome {
    let mut outcome = SampleOutcome::Ignored;
    for channel in SensorChannel::ALL {
        outcome = session
            .on_sample(SensorSample::new(channel, 1.0, 0.5, 9.81, 2.0))
            .unwrap();
    }
    outcome
}

/// Always answers with the same logits.
pub struct FixedClassifier {
    logits: Logits,
    delay: Option<Duration>,
}

impl FixedClassifier {
    pub fn new(logits: Logits) -> Self {
        Self { logits, delay: None }
    }

    pub fn uniform() -> Self {
        Self::new([0.0; 6])
    }

    /// Sleep before answering, to simulate a slow model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Classifier for FixedClassifier {
    fn run(&mut self, _input: &[f32], output: &mut [f32]) -> TrackerResult<usize> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        output.copy_from_slice(&self.logits);
        Ok(self.logits.len())
    }
}

/// Fails every `n`-th call, uniform logits otherwise.
pub struct FlakyClassifier {
    every: usize,
    calls: usize,
}

impl FlakyClassifier {
    pub fn failing_every(every: usize) -> Self {
        Self { every, calls: 0 }
    }
}

impl Classifier for FlakyClassifier {
    fn run(&mut self, _input: &[f32], output: &mut [f32]) -> TrackerResult<usize> {
        self.calls += 1;
        if self.calls % self.every == 0 {
            return Err(TrackerError::InferenceFailed(format!("call {}", self.calls)));
        }
        output.fill(0.0);
        Ok(output.len())
    }
}

pub struct FailingSink;

impl ResultSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    fn record(&mut self, _report: &FrameReport) -> TrackerResult<()> {
        Err(TrackerError::StorageError("disk full".to_string()))
    }
}

/// Ordered event names shared between fakes.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: &str) {
        self.0.lock().unwrap().push(event.to_string());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Sink that only logs which hooks ran.
pub struct LoggingSink {
    log: EventLog,
}

impl LoggingSink {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl ResultSink for LoggingSink {
    fn name(&self) -> &str {
        "logging"
    }

    fn begin(&mut self, _session_id: &str) -> TrackerResult<()> {
        self.log.push("begin");
        Ok(())
    }

    fn record(&mut self, _report: &FrameReport) -> TrackerResult<()> {
        self.log.push("record");
        Ok(())
    }

    fn finish(&mut self) -> TrackerResult<()> {
        self.log.push("finish");
        Ok(())
    }
}

/// Sensor source driven by the test: records subscriptions and forwards
/// samples pushed with `emit` to the registered sink.
#[derive(Default)]
pub struct RecordingSource {
    registrations: Mutex<Vec<SensorChannel>>,
    sinks: Mutex<HashMap<SensorChannel, SampleSender>>,
    unregistrations: AtomicUsize,
    log: Option<EventLog>,
}

impl RecordingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    /// Every `register` call so far, in order.
    pub fn registered_channels(&self) -> Vec<SensorChannel> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn unregister_count(&self) -> usize {
        self.unregistrations.load(Ordering::SeqCst)
    }

    /// Push a sample to its channel's sink. Returns false when the channel
    /// is not subscribed.
    pub fn emit(&self, sample: SensorSample) -> bool {
        let sink = self.sinks.lock().unwrap().get(&sample.channel).cloned();
        match sink {
            Some(tx) => tx.send(sample).is_ok(),
            None => false,
        }
    }
}

impl SensorSource for RecordingSource {
    fn register(&self, channel: SensorChannel, sink: SampleSender) -> TrackerResult<()> {
        self.registrations.lock().unwrap().push(channel);
        self.sinks.lock().unwrap().insert(channel, sink);
        if let Some(log) = &self.log {
            log.push("register");
        }
        Ok(())
    }

    fn unregister_all(&self) {
        self.sinks.lock().unwrap().clear();
        self.unregistrations.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.push("unregister");
        }
    }
}
