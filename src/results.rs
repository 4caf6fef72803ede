use serde::{Deserialize, Serialize};
use std::fmt;

use crate::inference::Logits;
use crate::types::{ActivityLabel, ACTIVITY_COUNT};

/// One class's share of the distribution, ready for display.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityScore {
    pub label: ActivityLabel,
    /// Probability scaled to [0, 100]; never NaN.
    pub percentage: f32,
    pub selected: bool,
}

impl fmt::Display for ActivityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2}%", self.label.display_name(), self.percentage)
    }
}

/// Normalized result for one frame, in model class order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRanking {
    pub probabilities: [f32; ACTIVITY_COUNT],
    pub scores: [ActivityScore; ACTIVITY_COUNT],
    pub selected: ActivityLabel,
}

impl ActivityRanking {
    pub fn selected_score(&self) -> &ActivityScore {
        &self.scores[self.selected.index()]
    }

    /// Display lines, one per class, e.g. `"Bus: 12.50%"`.
    pub fn lines(&self) -> Vec<String> {
        self.scores.iter().map(ToString::to_string).collect()
    }
}

/// Softmax over the logits, shifted by the maximum for stability.
pub fn softmax(logits: &Logits) -> [f32; ACTIVITY_COUNT] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out = [0.0f32; ACTIVITY_COUNT];
    let mut sum = 0.0f64;
    for (slot, &logit) in out.iter_mut().zip(logits.iter()) {
        let e = ((logit - max) as f64).exp();
        *slot = e as f32;
        sum += e;
    }
    for slot in out.iter_mut() {
        *slot = (*slot as f64 / sum) as f32;
    }
    out
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

fn to_percentage(probability: f32) -> f32 {
    let pct = probability * 100.0;
    if pct.is_nan() {
        0.0
    } else {
        pct.clamp(0.0, 100.0)
    }
}

/// Turns raw logits into a ranked, display-safe distribution.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultProcessor;

impl ResultProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, logits: &Logits) -> ActivityRanking {
        let probabilities = softmax(logits);
        let percentages = probabilities.map(to_percentage);
        let winner = argmax(&percentages);

        let scores = std::array::from_fn(|i| ActivityScore {
            label: ActivityLabel::ALL[i],
            percentage: percentages[i],
            selected: i == winner,
        });

        ActivityRanking {
            probabilities: probabilities.map(|p| if p.is_nan() { 0.0 } else { p }),
            scores,
            selected: ActivityLabel::ALL[winner],
        }
    }
}
