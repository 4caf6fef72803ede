use crossbeam::channel::{Sender, TrySendError};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::error::{lock_error, TrackerError, TrackerResult};
use crate::types::{SensorChannel, SensorSample};

/// Where a sensor source delivers its samples.
pub type SampleSender = Sender<SensorSample>;

/// A platform sensor service.
///
/// Delivery is best effort: sources push with `try_send` and drop samples
/// the session cannot take.
pub trait SensorSource: Send + Sync {
    /// Start delivering `channel` into `sink`. Registering a channel that is
    /// already delivering is a no-op, so the session may re-arm freely.
    fn register(&self, channel: SensorChannel, sink: SampleSender) -> TrackerResult<()>;

    /// Cancel every channel. Samples still in flight are ignored by the
    /// session once it has stopped.
    fn unregister_all(&self);
}

/// Polls `termux-sensor` once per period on a tokio runtime, falling back to
/// a synthetic signal when the tool is unavailable.
pub struct PolledSensors {
    runtime: Handle,
    period: Duration,
    use_termux: bool,
    tasks: Mutex<HashMap<SensorChannel, JoinHandle<()>>>,
}

impl PolledSensors {
    pub fn new(runtime: Handle, period: Duration) -> Self {
        Self {
            runtime,
            period,
            use_termux: true,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Synthetic data only; never spawns `termux-sensor`.
    pub fn simulated(runtime: Handle, period: Duration) -> Self {
        Self {
            use_termux: false,
            ..Self::new(runtime, period)
        }
    }

    pub fn active_channels(&self) -> Vec<SensorChannel> {
        self.tasks
            .lock()
            .map(|tasks| {
                SensorChannel::ALL
                    .iter()
                    .copied()
                    .filter(|c| tasks.get(c).map(|h| !h.is_finished()).unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl SensorSource for PolledSensors {
    fn register(&self, channel: SensorChannel, sink: SampleSender) -> TrackerResult<()> {
        let mut tasks = self.tasks.lock().map_err(lock_error("sensor tasks"))?;
        if let Some(handle) = tasks.get(&channel) {
            if !handle.is_finished() {
                return Ok(());
            }
        }

        let task = self
            .runtime
            .spawn(sensor_loop(channel, sink, self.period, self.use_termux));
        tasks.insert(channel, task);
        info!("[{}] subscribed", channel);
        Ok(())
    }

    fn unregister_all(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for (channel, task) in tasks.drain() {
                task.abort();
                info!("[{}] unsubscribed", channel);
            }
        }
    }
}

async fn sensor_loop(channel: SensorChannel, tx: SampleSender, period: Duration, use_termux: bool) {
    let mut interval = interval(period);
    let mut mock = MockSignal::new(channel);
    let mut termux_available = use_termux;
    let mut sample_count = 0u64;

    loop {
        interval.tick().await;

        let reading = if termux_available {
            match read_termux(channel).await {
                Ok(sample) => Some(sample),
                Err(e) => {
                    warn!("[{}] {}, using synthetic data", channel, e);
                    termux_available = false;
                    None
                }
            }
        } else {
            None
        };
        let sample = reading.unwrap_or_else(|| mock.next_sample());

        match tx.try_send(sample) {
            Ok(_) => {
                sample_count += 1;
                if sample_count % 100 == 0 {
                    debug!("[{}] {} samples", channel, sample_count);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("[{}] channel closed after {} samples", channel, sample_count);
                break;
            }
            Err(TrySendError::Full(_)) => {
                // Session busy, drop this sample
            }
        }
    }
}

async fn read_termux(channel: SensorChannel) -> TrackerResult<SensorSample> {
    let output = Command::new("termux-sensor")
        .arg("-n")
        .arg("1")
        .arg("-s")
        .arg(channel.sensor_name())
        .output()
        .await
        .map_err(|e| TrackerError::SensorFailed(format!("termux-sensor: {}", e)))?;
    let text = String::from_utf8_lossy(&output.stdout);
    let values = parse_termux_output(&text)?;
    Ok(SensorSample::from_values(channel, &values, current_timestamp()))
}

/// Extract the `values` array from `termux-sensor` JSON output, e.g.
/// `{"LSM6DSO Accelerometer": {"values": [0.1, 9.7, 0.3]}}`.
fn parse_termux_output(output: &str) -> TrackerResult<Vec<f32>> {
    let json: Value = serde_json::from_str(output.trim())
        .map_err(|e| TrackerError::SensorFailed(format!("unreadable termux output: {}", e)))?;
    let values = json
        .as_object()
        .and_then(|sensors| sensors.values().next())
        .and_then(|sensor| sensor.get("values"))
        .and_then(Value::as_array)
        .ok_or_else(|| TrackerError::SensorFailed("no values in termux output".to_string()))?;
    Ok(values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Deterministic stand-in signal per channel.
struct MockSignal {
    channel: SensorChannel,
    tick: u64,
}

impl MockSignal {
    fn new(channel: SensorChannel) -> Self {
        Self { channel, tick: 0 }
    }

    fn next_sample(&mut self) -> SensorSample {
        use std::f64::consts::PI;
        let t = self.tick as f64 * 0.02;
        self.tick += 1;

        let (x, y, z) = match self.channel {
            SensorChannel::Accel => (
                (t * 2.0 * PI).sin() * 0.5,
                (t * 2.0 * PI).cos() * 0.3,
                9.81 + (t * PI).sin() * 0.1,
            ),
            SensorChannel::Gyro => (
                (t * 0.5).sin() * 0.05,
                (t * 0.3).cos() * 0.03,
                (t * 1.0).sin() * 0.1,
            ),
            SensorChannel::Mag => (
                22.0 + (t * 0.2).sin() * 1.5,
                -5.0 + (t * 0.2).cos() * 1.5,
                -41.0 + (t * 0.1).sin() * 0.5,
            ),
        };

        SensorSample::new(self.channel, x as f32, y as f32, z as f32, current_timestamp())
    }
}

pub fn current_timestamp() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
