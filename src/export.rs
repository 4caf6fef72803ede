use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::error::{lock_error, TrackerError, TrackerResult};
use crate::features::FEATURE_NAMES;
use crate::pipeline::FrameReport;
use crate::session::SessionMetadata;

pub const RAW_CSV_HEADER: &str = "Timestamp,AccX,AccY,AccZ,GyroX,GyroY,GyroZ,MagX,MagY,MagZ";

/// Consumer of per-frame results (display, logging, persistence).
///
/// Calls happen on the session's inference worker, in frame order. Errors
/// are logged by the caller and never stop the session.
pub trait ResultSink: Send {
    fn name(&self) -> &str;

    fn begin(&mut self, _session_id: &str) -> TrackerResult<()> {
        Ok(())
    }

    fn record(&mut self, report: &FrameReport) -> TrackerResult<()>;

    /// Flush and release resources. Called once, after the last frame.
    fn finish(&mut self) -> TrackerResult<()> {
        Ok(())
    }
}

/// `Timestamp,AccX,...,MagZ` row for the raw samples of a report.
pub fn raw_sample_row(report: &FrameReport) -> String {
    let values: Vec<String> = report
        .frame
        .raw_values()
        .iter()
        .map(|v| v.to_string())
        .collect();
    format!("{},{}", report.timestamp_ms, values.join(","))
}

/// 24-column row of the model input.
pub fn feature_row(report: &FrameReport) -> String {
    let values: Vec<String> = report
        .features
        .as_slice()
        .iter()
        .map(|v| v.to_string())
        .collect();
    values.join(",")
}

pub fn feature_header() -> String {
    FEATURE_NAMES.join(",")
}

/// Writes raw samples and model inputs as two CSV streams.
///
/// Each stream gets its header once, before the first row it receives.
/// Every line is flushed so a crash loses at most the frame in flight.
pub struct CsvSink<W: Write + Send> {
    raw: Option<W>,
    features: Option<W>,
    raw_header_written: bool,
    feature_header_written: bool,
}

impl<W: Write + Send> CsvSink<W> {
    pub fn new(raw: W, features: W) -> Self {
        Self {
            raw: Some(raw),
            features: Some(features),
            raw_header_written: false,
            feature_header_written: false,
        }
    }

    /// Resume appending to streams that already carry their headers.
    pub fn appending(raw: W, features: W) -> Self {
        Self {
            raw_header_written: true,
            feature_header_written: true,
            ..Self::new(raw, features)
        }
    }

    /// Give the writers back, e.g. to inspect in-memory buffers.
    pub fn into_inner(self) -> (Option<W>, Option<W>) {
        (self.raw, self.features)
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> TrackerResult<()> {
    writeln!(writer, "{}", line)?;
    writer.flush()?;
    Ok(())
}

impl<W: Write + Send> ResultSink for CsvSink<W> {
    fn name(&self) -> &str {
        "csv"
    }

    fn record(&mut self, report: &FrameReport) -> TrackerResult<()> {
        let raw = self
            .raw
            .as_mut()
            .ok_or_else(|| TrackerError::StorageError("raw CSV writer closed".to_string()))?;
        if !self.raw_header_written {
            write_line(raw, RAW_CSV_HEADER)?;
            self.raw_header_written = true;
        }
        write_line(raw, &raw_sample_row(report))?;

        let features = self
            .features
            .as_mut()
            .ok_or_else(|| TrackerError::StorageError("feature CSV writer closed".to_string()))?;
        if !self.feature_header_written {
            write_line(features, &feature_header())?;
            self.feature_header_written = true;
        }
        write_line(features, &feature_row(report))?;

        debug!("csv: wrote frame #{}", report.sequence);
        Ok(())
    }

    fn finish(&mut self) -> TrackerResult<()> {
        if let Some(w) = self.raw.as_mut() {
            w.flush()?;
        }
        if let Some(w) = self.features.as_mut() {
            w.flush()?;
        }
        Ok(())
    }
}

/// Human-readable ranking, one line per class, selected class marked.
pub struct TextSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ResultSink for TextSink<W> {
    fn name(&self) -> &str {
        "text"
    }

    fn begin(&mut self, session_id: &str) -> TrackerResult<()> {
        writeln!(self.out, "=== {} ===", session_id)?;
        Ok(())
    }

    fn record(&mut self, report: &FrameReport) -> TrackerResult<()> {
        writeln!(self.out, "--- measurement {} ---", report.sequence)?;
        for score in &report.ranking.scores {
            let marker = if score.selected { " <" } else { "" };
            writeln!(self.out, "{}{}", score, marker)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps every report in memory; clones share the same history.
#[derive(Clone, Default)]
pub struct HistorySink {
    reports: Arc<Mutex<Vec<FrameReport>>>,
}

impl HistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the reports recorded so far.
    pub fn reports(&self) -> Vec<FrameReport> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for HistorySink {
    fn name(&self) -> &str {
        "history"
    }

    fn record(&mut self, report: &FrameReport) -> TrackerResult<()> {
        self.reports
            .lock()
            .map_err(lock_error("history"))?
            .push(report.clone());
        Ok(())
    }
}

/// Complete session export (JSON-serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub metadata: SessionMetadata,
    pub reports: Vec<FrameReport>,
}

impl SessionExport {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}
