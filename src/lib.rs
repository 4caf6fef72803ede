// Activity Tracker core library
// Fuses accel/gyro/mag samples into frames and classifies each frame

pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod features;
pub mod fusion_buffer;
pub mod inference;
pub mod pipeline;
pub mod results;
pub mod sensors;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use controller::SessionController;
pub use error::{TrackerError, TrackerResult};
pub use features::{FeatureExtractor, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use fusion_buffer::{FusionFrame, SensorFusionBuffer};
pub use inference::{Classifier, DenseClassifier, DenseWeights, InferenceEngine, Logits};
pub use pipeline::{FrameReport, Pipeline};
pub use results::{ActivityRanking, ActivityScore, ResultProcessor};
pub use session::{SampleOutcome, Session, SessionMetadata, SessionState};
pub use types::{ActivityLabel, SensorChannel, SensorSample};
