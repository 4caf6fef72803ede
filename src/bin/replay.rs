use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use activity_tracker_rs::export::{CsvSink, HistorySink, TextSink, RAW_CSV_HEADER};
use activity_tracker_rs::inference::{DenseClassifier, DenseWeights, InferenceEngine};
use activity_tracker_rs::types::{SensorChannel, SensorSample};
use activity_tracker_rs::{FusionFrame, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Re-classify a recorded sensor_data.csv offline", long_about = None)]
struct Args {
    /// Raw sample log written by activity_tracker
    #[arg(long)]
    input: PathBuf,

    /// Dense classifier weights (JSON with `weights` and `bias`)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Write regenerated raw/feature CSVs into this directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Print every ranking, not just the summary
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let frames = load_frames(&args.input)?;
    info!("Loaded {} frames from {}", frames.len(), args.input.display());

    let classifier = match &args.weights {
        Some(path) => DenseClassifier::from_json(
            &fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        )?,
        None => {
            warn!("No --weights given, every class will score equally");
            DenseClassifier::new(DenseWeights::zeros())?
        }
    };

    let history = HistorySink::new();
    let engine = InferenceEngine::new(Box::new(classifier));
    let mut pipeline = Pipeline::new(engine).with_sink(Box::new(history.clone()));
    if args.verbose {
        pipeline.add_sink(Box::new(TextSink::new(std::io::stdout())));
    }
    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)?;
        let raw = BufWriter::new(File::create(dir.join("sensor_data.csv"))?);
        let features = BufWriter::new(File::create(dir.join("model_input_data.csv"))?);
        pipeline.add_sink(Box::new(CsvSink::new(raw, features)));
    }

    pipeline.begin(&format!("replay {}", args.input.display()));
    let mut failures = 0usize;
    for (i, frame) in frames.into_iter().enumerate() {
        match pipeline.process(i as u32 + 1, frame) {
            Ok(report) => pipeline.publish(&report),
            Err(e) => {
                warn!("frame #{} skipped: {}", i + 1, e);
                failures += 1;
            }
        }
    }
    pipeline.finish();

    let reports = history.reports();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for report in &reports {
        *counts.entry(report.ranking.selected.display_name()).or_default() += 1;
    }

    println!("\n=== Replay summary ===");
    println!("Frames: {} classified, {} failed", reports.len(), failures);
    for (label, count) in counts {
        let share = 100.0 * count as f64 / reports.len().max(1) as f64;
        println!("  {:<26} {:>5}  ({:.1}%)", label, count, share);
    }
    Ok(())
}

fn load_frames(path: &Path) -> Result<Vec<FusionFrame>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut frames = Vec::new();

    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line == RAW_CSV_HEADER {
            continue;
        }
        let frame = parse_row(line).with_context(|| format!("line {}", lineno + 1))?;
        frames.push(frame);
    }
    Ok(frames)
}

/// `Timestamp(ms),AccX,AccY,AccZ,GyroX,GyroY,GyroZ,MagX,MagY,MagZ`
fn parse_row(line: &str) -> Result<FusionFrame> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 10 {
        bail!("expected 10 columns, got {}", fields.len());
    }

    let timestamp = fields[0]
        .parse::<f64>()
        .map_err(|e| anyhow!("timestamp '{}': {}", fields[0], e))?
        / 1000.0;
    let mut values = [0.0f32; 9];
    for (slot, field) in values.iter_mut().zip(&fields[1..]) {
        *slot = field
            .parse()
            .map_err(|e| anyhow!("value '{}': {}", field, e))?;
    }

    let sample = |channel: SensorChannel, offset: usize| {
        SensorSample::from_values(channel, &values[offset..offset + 3], timestamp)
    };
    Ok(FusionFrame::new(
        sample(SensorChannel::Accel, 0),
        sample(SensorChannel::Gyro, 3),
        sample(SensorChannel::Mag, 6),
    )?)
}
