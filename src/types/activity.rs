use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of classes the pretrained model distinguishes.
pub const ACTIVITY_COUNT: usize = 6;

/// Activity classes, index-aligned with the model's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityLabel {
    Walking,
    Metro,
    Bus,
    Car,
    Stairs,
    Stationary,
}

impl ActivityLabel {
    /// All labels in model output order.
    pub const ALL: [ActivityLabel; ACTIVITY_COUNT] = [
        ActivityLabel::Walking,
        ActivityLabel::Metro,
        ActivityLabel::Bus,
        ActivityLabel::Car,
        ActivityLabel::Stairs,
        ActivityLabel::Stationary,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ActivityLabel::Walking => "Walking",
            ActivityLabel::Metro => "Metro",
            ActivityLabel::Bus => "Bus",
            ActivityLabel::Car => "Driving a car",
            ActivityLabel::Stairs => "Going up or down stairs",
            ActivityLabel::Stationary => "Stationary",
        }
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
