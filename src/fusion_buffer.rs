// fusion_buffer.rs: frame synchronization for the three motion channels
//
// Each channel keeps only its most recent sample. A frame is emitted the
// moment all three slots hold a sample that has not yet been consumed, and
// the slots are cleared in the same step, so a sample can feed at most one
// frame.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::{lock_error, TrackerError, TrackerResult};
use crate::types::{SensorChannel, SensorSample, CHANNEL_COUNT};

/// One synchronized triple of channel samples.
///
/// `FrameAssembler` emits these as samples arrive; `FusionFrame::new` builds
/// one from recorded samples and checks that each slot holds its channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionFrame {
    pub accel: SensorSample,
    pub gyro: SensorSample,
    pub mag: SensorSample,
}

impl FusionFrame {
    pub fn new(accel: SensorSample, gyro: SensorSample, mag: SensorSample) -> TrackerResult<Self> {
        let expected = [SensorChannel::Accel, SensorChannel::Gyro, SensorChannel::Mag];
        for (sample, channel) in [&accel, &gyro, &mag].into_iter().zip(expected) {
            if sample.channel != channel {
                return Err(TrackerError::InvalidParameters(format!(
                    "{} sample in the {} slot",
                    sample.channel, channel
                )));
            }
        }
        Ok(Self { accel, gyro, mag })
    }

    /// Timestamp of the sample that completed the frame.
    pub fn timestamp(&self) -> f64 {
        self.accel
            .timestamp
            .max(self.gyro.timestamp)
            .max(self.mag.timestamp)
    }

    /// Raw values flattened as `[AccX, AccY, AccZ, GyroX, ..., MagZ]`.
    pub fn raw_values(&self) -> [f32; 9] {
        let mut out = [0.0; 9];
        out[0..3].copy_from_slice(&self.accel.values);
        out[3..6].copy_from_slice(&self.gyro.values);
        out[6..9].copy_from_slice(&self.mag.values);
        out
    }
}

/// Latest-sample-per-channel slots. Not synchronized; callers that share it
/// across threads wrap it in a lock (see `SensorFusionBuffer`).
#[derive(Debug, Default)]
pub struct FrameAssembler {
    slots: [Option<SensorSample>; CHANNEL_COUNT],
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `sample` as its channel's latest value (last writer wins).
    /// Returns the completed frame once every channel is filled, leaving all
    /// slots empty.
    pub fn update(&mut self, sample: SensorSample) -> Option<FusionFrame> {
        let slot = sample.channel.index();
        self.slots[slot] = Some(sample);

        if self.slots.iter().all(Option::is_some) {
            self.take_frame()
        } else {
            None
        }
    }

    fn take_frame(&mut self) -> Option<FusionFrame> {
        let [accel, gyro, mag] = &mut self.slots;
        match (accel.take(), gyro.take(), mag.take()) {
            (Some(accel), Some(gyro), Some(mag)) => Some(FusionFrame { accel, gyro, mag }),
            _ => None,
        }
    }

    /// Channels currently holding an unconsumed sample.
    pub fn pending(&self) -> Vec<SensorChannel> {
        SensorChannel::ALL
            .iter()
            .copied()
            .filter(|c| self.slots[c.index()].is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }
}

/// Thread-safe fusion buffer shared by independently scheduled sensor
/// callbacks.
#[derive(Debug, Default)]
pub struct SensorFusionBuffer {
    inner: Mutex<FrameAssembler>,
}

impl SensorFusionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, sample: SensorSample) -> TrackerResult<Option<FusionFrame>> {
        let mut assembler = self.inner.lock().map_err(lock_error("fusion buffer"))?;
        Ok(assembler.update(sample))
    }

    pub fn pending(&self) -> TrackerResult<Vec<SensorChannel>> {
        let assembler = self.inner.lock().map_err(lock_error("fusion buffer"))?;
        Ok(assembler.pending())
    }

    pub fn clear(&self) -> TrackerResult<()> {
        self.inner
            .lock()
            .map_err(lock_error("fusion buffer"))?
            .clear();
        Ok(())
    }
}
