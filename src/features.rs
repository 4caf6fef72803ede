//! Feature synthesis for the activity classifier.
//!
//! The model was trained on 24 hand-picked combinations of the converted
//! sensor axes. Each entry is either a single axis or the Euclidean norm of
//! two axes, possibly from different sensors. The order of `FEATURE_NAMES` is
//! part of the model interface.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::fusion_buffer::FusionFrame;

/// Standard gravity used to express acceleration in g.
pub const GRAVITY_MS2: f64 = 9.81;

pub const FEATURE_COUNT: usize = 24;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Az", "AyGx", "AxGx", "AyGy", "AxGy", "AzGx", "Mxz", "MyGx", "AyMz", "Ayz", "Mz", "Ax", "My",
    "Gzy", "Ay", "MxGx", "MxGy", "Myz", "Mx", "Mxy", "AyMx", "AzMx", "AyMy", "Gz",
];

/// Model input in contract order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f32; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn values(&self) -> [f32; FEATURE_COUNT] {
        self.0
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Look a feature up by its contract name, e.g. `"AyGx"`.
    pub fn get(&self, name: &str) -> Option<f32> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

/// Sensor axes after unit conversion: acceleration in g, angular rate in
/// °/s, magnetic field unchanged in µT.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvertedAxes {
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
    pub mag: Vector3<f64>,
}

impl ConvertedAxes {
    pub fn new(accel_ms2: [f32; 3], gyro_rads: [f32; 3], mag_ut: [f32; 3]) -> Self {
        Self {
            accel: to_vector(accel_ms2) / GRAVITY_MS2,
            gyro: to_vector(gyro_rads).map(f64::to_degrees),
            mag: to_vector(mag_ut),
        }
    }
}

fn to_vector(values: [f32; 3]) -> Vector3<f64> {
    Vector3::new(values[0] as f64, values[1] as f64, values[2] as f64)
}

fn pair(a: f64, b: f64) -> f32 {
    Vector2::new(a, b).norm() as f32
}

/// Stateless transform from raw samples to the model's feature vector.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, frame: &FusionFrame) -> FeatureVector {
        self.extract_raw(frame.accel.values, frame.gyro.values, frame.mag.values)
    }

    pub fn extract_raw(
        &self,
        accel_ms2: [f32; 3],
        gyro_rads: [f32; 3],
        mag_ut: [f32; 3],
    ) -> FeatureVector {
        self.extract_converted(&ConvertedAxes::new(accel_ms2, gyro_rads, mag_ut))
    }

    pub fn extract_converted(&self, axes: &ConvertedAxes) -> FeatureVector {
        let (ax, ay, az) = (axes.accel.x, axes.accel.y, axes.accel.z);
        let (gx, gy, gz) = (axes.gyro.x, axes.gyro.y, axes.gyro.z);
        let (mx, my, mz) = (axes.mag.x, axes.mag.y, axes.mag.z);

        FeatureVector([
            az as f32, // Az
            pair(ay, gx), // AyGx
            pair(ax, gx), // AxGx
            pair(ay, gy), // AyGy
            pair(ax, gy), // AxGy
            pair(az, gx), // AzGx
            pair(mx, mz), // Mxz
            pair(my, gx), // MyGx
            pair(ay, mz), // AyMz
            pair(ay, az), // Ayz
            mz as f32, // Mz
            ax as f32, // Ax
            my as f32, // My
            pair(gz, gy), // Gzy
            ay as f32, // Ay
            pair(mx, gx), // MxGx
            pair(mx, gy), // MxGy
            pair(my, mz), // Myz
            mx as f32, // Mx
            pair(mx, my), // Mxy
            pair(ay, mx), // AyMx
            pair(az, mx), // AzMx
            pair(ay, my), // AyMy
            gz as f32, // Gz
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_one_g_on_x_axis() {
        let features = FeatureExtractor::new().extract_raw([9.81, 0.0, 0.0], [0.0; 3], [0.0; 3]);

        assert_eq!(features.as_slice().len(), FEATURE_COUNT);
        assert_relative_eq!(features.as_slice()[11], 1.0, epsilon = 1e-6);
        assert_eq!(features.as_slice()[1], 0.0);
        assert_eq!(features.get("Ax"), Some(features.as_slice()[11]));
        assert_relative_eq!(features.get("AxGx").unwrap(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_contract_order() {
        // Axes chosen so every feature has a distinct, hand-checkable value:
        // A = (1, 2, 3) g, G = (4, 5, 6) °/s, M = (7, 8, 9) µT.
        let accel = [1.0 * 9.81, 2.0 * 9.81, 3.0 * 9.81];
        let gyro = [
            4.0f32.to_radians(),
            5.0f32.to_radians(),
            6.0f32.to_radians(),
        ];
        let mag = [7.0, 8.0, 9.0];

        let features = FeatureExtractor::new().extract_raw(accel, gyro, mag);

        let expected: [f64; FEATURE_COUNT] = [
            3.0,              // Az
            20f64.sqrt(),     // AyGx
            17f64.sqrt(),     // AxGx
            29f64.sqrt(),     // AyGy
            26f64.sqrt(),     // AxGy
            5.0,              // AzGx
            130f64.sqrt(),    // Mxz
            80f64.sqrt(),     // MyGx
            85f64.sqrt(),     // AyMz
            13f64.sqrt(),     // Ayz
            9.0,              // Mz
            1.0,              // Ax
            8.0,              // My
            61f64.sqrt(),     // Gzy
            2.0,              // Ay
            65f64.sqrt(),     // MxGx
            74f64.sqrt(),     // MxGy
            145f64.sqrt(),    // Myz
            7.0,              // Mx
            113f64.sqrt(),    // Mxy
            53f64.sqrt(),     // AyMx
            58f64.sqrt(),     // AzMx
            68f64.sqrt(),     // AyMy
            6.0,              // Gz
        ];

        for (i, (got, want)) in features.as_slice().iter().zip(expected.iter()).enumerate() {
            let diff = (*got as f64 - *want).abs();
            assert!(diff < 1e-4, "{} = {}, expected {}", FEATURE_NAMES[i], got, want);
        }
    }

    #[test]
    fn test_gyro_conversion_does_not_alias_input() {
        let gyro = [std::f32::consts::PI, 0.0, 0.0];
        let features = FeatureExtractor::new().extract_raw([0.0; 3], gyro, [0.0; 3]);

        assert_eq!(gyro[0], std::f32::consts::PI);
        assert_relative_eq!(features.get("AxGx").unwrap(), 180.0, epsilon = 1e-3);
    }

    #[test]
    fn test_zero_frame_is_all_zero() {
        let features = FeatureExtractor::new().extract_raw([0.0; 3], [0.0; 3], [0.0; 3]);
        assert!(features.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_named_lookup_covers_all_features() {
        let features = FeatureExtractor::new().extract_raw([1.0; 3], [1.0; 3], [1.0; 3]);
        for (name, value) in features.iter() {
            assert_eq!(features.get(name), Some(value));
        }
        assert_eq!(features.get("Q"), None);
    }

    #[test]
    fn test_finite_inputs_stay_finite() {
        let extractor = FeatureExtractor::new();
        for &v in &[-1.0e6f32, -3.5, 0.0, 1.0e-7, 42.0, 1.0e6] {
            let features = extractor.extract_raw([v; 3], [v; 3], [-v; 3]);
            assert_eq!(features.len(), FEATURE_COUNT);
            assert!(features.as_slice().iter().all(|f| f.is_finite()));
        }
    }
}
