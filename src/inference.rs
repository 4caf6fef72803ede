//! Inference wrapper around the fixed-shape activity classifier.
//!
//! The model artifact is produced and loaded elsewhere; this module only
//! knows that it maps 24 features to 6 logits.

use log::debug;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};
use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::types::ACTIVITY_COUNT;

/// Raw per-class model output, index-aligned with `ActivityLabel::ALL`.
pub type Logits = [f32; ACTIVITY_COUNT];

/// A ready-to-run classifier handle.
///
/// `input` always holds exactly `FEATURE_COUNT` values and `output` exactly
/// `ACTIVITY_COUNT`. Implementations return the number of values they wrote.
pub trait Classifier: Send {
    fn run(&mut self, input: &[f32], output: &mut [f32]) -> TrackerResult<usize>;
}

impl<F> Classifier for F
where
    F: FnMut(&[f32], &mut [f32]) -> TrackerResult<usize> + Send,
{
    fn run(&mut self, input: &[f32], output: &mut [f32]) -> TrackerResult<usize> {
        self(input, output)
    }
}

pub struct InferenceEngine {
    model: Box<dyn Classifier>,
    runs: u64,
}

impl InferenceEngine {
    pub fn new(model: Box<dyn Classifier>) -> Self {
        Self { model, runs: 0 }
    }

    /// Run one feature vector, writing the logits into the front of `output`.
    pub fn run_into(&mut self, features: &FeatureVector, output: &mut [f32]) -> TrackerResult<()> {
        if output.len() < ACTIVITY_COUNT {
            return Err(TrackerError::InsufficientCapacity {
                needed: ACTIVITY_COUNT,
                available: output.len(),
            });
        }

        let input = features.as_slice();
        if input.len() != FEATURE_COUNT {
            return Err(TrackerError::InsufficientCapacity {
                needed: FEATURE_COUNT,
                available: input.len(),
            });
        }

        let written = self.model.run(input, &mut output[..ACTIVITY_COUNT])?;
        if written != ACTIVITY_COUNT {
            return Err(TrackerError::ModelOutput {
                expected: ACTIVITY_COUNT,
                actual: written,
            });
        }

        self.runs += 1;
        debug!("inference #{} logits {:?}", self.runs, &output[..ACTIVITY_COUNT]);
        Ok(())
    }

    pub fn run(&mut self, features: &FeatureVector) -> TrackerResult<Logits> {
        let mut logits = [0.0; ACTIVITY_COUNT];
        self.run_into(features, &mut logits)?;
        Ok(logits)
    }

    /// Number of successful inferences since construction.
    pub fn runs(&self) -> u64 {
        self.runs
    }
}

/// Serialized form of a dense 24 → 6 layer: one weight row per class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseWeights {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl DenseWeights {
    /// All-zero layer. Every input maps to uniform logits.
    pub fn zeros() -> Self {
        Self {
            weights: vec![vec![0.0; FEATURE_COUNT]; ACTIVITY_COUNT],
            bias: vec![0.0; ACTIVITY_COUNT],
        }
    }
}

/// Fixed-topology affine classifier, `logits = W · x + b`.
#[derive(Clone, Debug)]
pub struct DenseClassifier {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl DenseClassifier {
    pub fn new(params: DenseWeights) -> TrackerResult<Self> {
        if params.weights.len() != ACTIVITY_COUNT {
            return Err(TrackerError::InvalidParameters(format!(
                "expected {} weight rows, got {}",
                ACTIVITY_COUNT,
                params.weights.len()
            )));
        }
        if let Some(row) = params.weights.iter().find(|r| r.len() != FEATURE_COUNT) {
            return Err(TrackerError::InvalidParameters(format!(
                "expected {} weights per row, got {}",
                FEATURE_COUNT,
                row.len()
            )));
        }
        if params.bias.len() != ACTIVITY_COUNT {
            return Err(TrackerError::InvalidParameters(format!(
                "expected {} bias terms, got {}",
                ACTIVITY_COUNT,
                params.bias.len()
            )));
        }

        let flat: Vec<f32> = params.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((ACTIVITY_COUNT, FEATURE_COUNT), flat)
            .map_err(|e| TrackerError::InvalidParameters(format!("weight matrix: {e}")))?;

        Ok(Self {
            weights,
            bias: Array1::from(params.bias),
        })
    }

    pub fn from_json(json: &str) -> TrackerResult<Self> {
        let params: DenseWeights = serde_json::from_str(json)
            .map_err(|e| TrackerError::InvalidParameters(format!("weights JSON: {e}")))?;
        Self::new(params)
    }
}

impl Classifier for DenseClassifier {
    fn run(&mut self, input: &[f32], output: &mut [f32]) -> TrackerResult<usize> {
        if input.len() != FEATURE_COUNT {
            return Err(TrackerError::InsufficientCapacity {
                needed: FEATURE_COUNT,
                available: input.len(),
            });
        }
        if output.len() < ACTIVITY_COUNT {
            return Err(TrackerError::InsufficientCapacity {
                needed: ACTIVITY_COUNT,
                available: output.len(),
            });
        }

        let x = ArrayView1::from(input);
        let logits = self.weights.dot(&x) + &self.bias;
        for (slot, value) in output.iter_mut().zip(logits.iter()) {
            *slot = *value;
        }
        Ok(logits.len())
    }
}
