use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::bounded;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use activity_tracker_rs::export::{CsvSink, HistorySink, SessionExport, TextSink};
use activity_tracker_rs::inference::{DenseClassifier, DenseWeights, InferenceEngine};
use activity_tracker_rs::sensors::{PolledSensors, SensorSource};
use activity_tracker_rs::{Pipeline, SessionConfig, SessionController, TrackerError};

#[derive(Parser, Debug)]
#[command(name = "activity_tracker")]
#[command(about = "Classify motion activity from motion sensors", long_about = None)]
struct Args {
    /// Measurements per session
    #[arg(long, default_value = "100")]
    cap: u32,

    /// Number of sessions to run back to back (each restarts the counter)
    #[arg(long, default_value = "1")]
    sessions: u32,

    /// Sensor re-subscription period in milliseconds
    #[arg(long, default_value = "1000")]
    rearm_ms: u64,

    /// Sensor polling period in milliseconds
    #[arg(long, default_value = "50")]
    sensor_period_ms: u64,

    /// Dense classifier weights (JSON with `weights` and `bias`)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Use synthetic sensor data instead of termux-sensor
    #[arg(long)]
    simulated: bool,

    /// Skip the raw/feature CSV logs
    #[arg(long)]
    no_csv: bool,

    /// Do not print per-measurement rankings
    #[arg(long)]
    quiet: bool,

    /// Output directory
    #[arg(long, default_value = "activity_sessions")]
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let config = SessionConfig {
        rearm_interval: Duration::from_millis(args.rearm_ms),
        measurement_cap: args.cap,
        ..SessionConfig::default()
    };
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new()?;
    let period = Duration::from_millis(args.sensor_period_ms.max(1));
    let source: Arc<dyn SensorSource> = if args.simulated {
        Arc::new(PolledSensors::simulated(runtime.handle().clone(), period))
    } else {
        Arc::new(PolledSensors::new(runtime.handle().clone(), period))
    };

    let history = HistorySink::new();
    let mut pipeline = Pipeline::new(load_engine(args.weights.as_deref())?)
        .with_sink(Box::new(history.clone()));
    if !args.quiet {
        pipeline.add_sink(Box::new(TextSink::new(std::io::stdout())));
    }
    if !args.no_csv {
        pipeline.add_sink(Box::new(open_csv_sink(&args.output_dir)?));
    }

    let (interrupt_tx, interrupt_rx) = bounded::<()>(1);
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.try_send(());
        }
    });

    info!(
        "Activity tracker starting: {} session(s) of {} measurements",
        args.sessions, args.cap
    );

    let mut controller = SessionController::new(config, source, pipeline);
    let mut interrupted = false;

    for run in 0..args.sessions.max(1) {
        let session = if run == 0 {
            controller.start()?
        } else {
            controller.resume()?
        };
        let first_report = history.len();

        while !session.wait_stopped(Duration::from_millis(200)) {
            if interrupt_rx.try_recv().is_ok() {
                info!("Interrupted, stopping {}", session.id());
                match controller.pause() {
                    Ok(()) | Err(TrackerError::NotRunning) => {}
                    Err(e) => return Err(e.into()),
                }
                interrupted = true;
                break;
            }
        }

        let metadata = session.metadata()?;
        let export = SessionExport {
            metadata,
            reports: history.reports().split_off(first_report),
        };
        let path = args.output_dir.join(format!("{}.json", session.id()));
        fs::write(&path, export.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;

        print_summary(&export);
        info!("Saved {}", path.display());

        if interrupted {
            break;
        }
    }

    Ok(())
}

fn load_engine(weights: Option<&Path>) -> Result<InferenceEngine> {
    let classifier = match weights {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading weights {}", path.display()))?;
            DenseClassifier::from_json(&json)?
        }
        None => {
            warn!("No --weights given, every class will score equally");
            DenseClassifier::new(DenseWeights::zeros())?
        }
    };
    Ok(InferenceEngine::new(Box::new(classifier)))
}

fn open_csv_sink(dir: &Path) -> Result<CsvSink<BufWriter<File>>> {
    let raw_path = dir.join("sensor_data.csv");
    let feature_path = dir.join("model_input_data.csv");
    let resume = non_empty(&raw_path) && non_empty(&feature_path);

    let open = |path: &Path| -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(resume)
            .write(true)
            .truncate(!resume)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(BufWriter::new(file))
    };

    let raw = open(&raw_path)?;
    let features = open(&feature_path)?;
    Ok(if resume {
        CsvSink::appending(raw, features)
    } else {
        CsvSink::new(raw, features)
    })
}

fn non_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn print_summary(export: &SessionExport) {
    let meta = &export.metadata;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for report in &export.reports {
        *counts.entry(report.ranking.selected.display_name()).or_default() += 1;
    }

    println!("\n=== {} summary ===", meta.session_id);
    println!(
        "Frames: {} completed, {} classified, {} dropped, {} failed",
        meta.frames_completed,
        export.reports.len(),
        meta.frames_dropped,
        meta.inference_failures
    );
    println!(
        "Samples: accel {}, gyro {}, mag {}",
        meta.accel_sample_count, meta.gyro_sample_count, meta.mag_sample_count
    );
    for (label, count) in counts {
        println!("  {}: {}", label, count);
    }
}
