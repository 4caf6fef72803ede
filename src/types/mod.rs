pub mod activity;

pub use activity::{ActivityLabel, ACTIVITY_COUNT};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of motion channels that make up one frame.
pub const CHANNEL_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorChannel {
    Accel,
    Gyro,
    Mag,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; CHANNEL_COUNT] =
        [SensorChannel::Accel, SensorChannel::Gyro, SensorChannel::Mag];

    /// Slot index used by the frame assembler.
    pub fn index(self) -> usize {
        match self {
            SensorChannel::Accel => 0,
            SensorChannel::Gyro => 1,
            SensorChannel::Mag => 2,
        }
    }

    /// Sensor name as understood by `termux-sensor -s`.
    pub fn sensor_name(self) -> &'static str {
        match self {
            SensorChannel::Accel => "accelerometer",
            SensorChannel::Gyro => "gyroscope",
            SensorChannel::Mag => "magnetic_field",
        }
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorChannel::Accel => "accel",
            SensorChannel::Gyro => "gyro",
            SensorChannel::Mag => "mag",
        };
        f.write_str(name)
    }
}

/// One 3-axis reading from a single channel.
///
/// Units are the platform's native ones: m/s² for the accelerometer, rad/s
/// for the gyroscope and µT for the magnetometer. `timestamp` is seconds
/// since the Unix epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub channel: SensorChannel,
    pub values: [f32; 3],
    pub timestamp: f64,
}

impl SensorSample {
    pub fn new(channel: SensorChannel, x: f32, y: f32, z: f32, timestamp: f64) -> Self {
        Self {
            channel,
            values: [x, y, z],
            timestamp,
        }
    }

    /// Build a sample from however many axes the platform delivered.
    ///
    /// Axes beyond the end of `values` are recorded as 0.0; extra values are
    /// ignored.
    pub fn from_values(channel: SensorChannel, values: &[f32], timestamp: f64) -> Self {
        let axis = |i: usize| values.get(i).copied().unwrap_or(0.0);
        Self::new(channel, axis(0), axis(1), axis(2), timestamp)
    }

    pub fn x(&self) -> f32 {
        self.values[0]
    }

    pub fn y(&self) -> f32 {
        self.values[1]
    }

    pub fn z(&self) -> f32 {
        self.values[2]
    }

    pub fn magnitude(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}
