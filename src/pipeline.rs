// pipeline.rs: frame → features → logits → ranking → sinks
//
// Runs on the session's inference worker. Nothing here touches the fusion
// state or the session counter.

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::TrackerResult;
use crate::export::ResultSink;
use crate::features::{FeatureExtractor, FeatureVector};
use crate::fusion_buffer::FusionFrame;
use crate::inference::{InferenceEngine, Logits};
use crate::results::{ActivityRanking, ResultProcessor};

/// Everything produced for one completed frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// 1-based measurement number within the session.
    pub sequence: u32,
    /// Wall-clock time the frame was processed, ms since the Unix epoch.
    pub timestamp_ms: i64,
    pub frame: FusionFrame,
    pub features: FeatureVector,
    pub logits: Logits,
    pub ranking: ActivityRanking,
}

pub struct Pipeline {
    extractor: FeatureExtractor,
    engine: InferenceEngine,
    processor: ResultProcessor,
    sinks: Vec<Box<dyn ResultSink>>,
}

impl Pipeline {
    pub fn new(engine: InferenceEngine) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            engine,
            processor: ResultProcessor::new(),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn ResultSink>) {
        self.sinks.push(sink);
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Extraction, inference and normalization for one frame.
    pub fn process(&mut self, sequence: u32, frame: FusionFrame) -> TrackerResult<FrameReport> {
        let features = self.extractor.extract(&frame);
        let logits = self.engine.run(&features)?;
        let ranking = self.processor.process(&logits);

        debug!(
            "frame #{} → {} ({:.2}%)",
            sequence,
            ranking.selected,
            ranking.selected_score().percentage
        );

        Ok(FrameReport {
            sequence,
            timestamp_ms: Utc::now().timestamp_millis(),
            frame,
            features,
            logits,
            ranking,
        })
    }

    /// Hand a report to every sink. Sink failures are logged and skipped.
    pub fn publish(&mut self, report: &FrameReport) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.record(report) {
                warn!("sink '{}' failed on frame #{}: {}", sink.name(), report.sequence, e);
            }
        }
    }

    pub fn begin(&mut self, session_id: &str) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.begin(session_id) {
                warn!("sink '{}' failed to start: {}", sink.name(), e);
            }
        }
    }

    pub fn finish(&mut self) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.finish() {
                warn!("sink '{}' failed to finish: {}", sink.name(), e);
            }
        }
    }
}
