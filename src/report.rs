//! Operator-facing console lines.
//!
//! These are product output and go to stdout regardless of the log level;
//! diagnostics go through `tracing` instead.

use chrono::DateTime;
use chrono::Local;
use std::io;
use std::io::Write;
use std::path::Path;

use crate::endpoint::EndpointSummary;
use crate::session::SessionStats;

/// Receives the events a recording run shows to the operator.
pub trait Reporter {
    /// A new output file was named at `now`.
    fn on_file(&mut self, path: &Path, now: &DateTime<Local>);
    fn on_listening(&mut self, iface: &str);
    /// Sampled per-batch endpoint summary.
    fn on_summary(&mut self, summary: &EndpointSummary);
    fn on_stop(&mut self, stats: &SessionStats);
}

pub fn banner_line(now: &DateTime<Local>) -> String {
    format!(
        "--------- Time: {} [usec]{} ---------",
        now.format("%x %X"),
        now.timestamp_subsec_micros()
    )
}

pub fn listening_line(iface: &str) -> String {
    format!("\nlistening on {}... Press Ctrl+C to stop...", iface)
}

pub fn summary_line(summary: &EndpointSummary) -> String {
    format!(" IP: {}", summary)
}

/// Writes the console lines to stdout (or any other writer).
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn new() -> Self {
        ConsoleReporter { out: io::stdout() }
    }
}

impl Default for ConsoleReporter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn with_writer(out: W) -> Self {
        ConsoleReporter { out }
    }
    pub fn into_inner(self) -> W {
        self.out
    }
    fn line(&mut self, line: &str) {
        // a closed stdout must not stop the recording
        if let Err(e) = writeln!(self.out, "{}", line) {
            tracing::warn!("console write failed: {}", e);
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn on_file(&mut self, path: &Path, now: &DateTime<Local>) {
        self.line(&banner_line(now));
        tracing::info!("recording to {}", path.display());
    }
    fn on_listening(&mut self, iface: &str) {
        self.line(&listening_line(iface));
    }
    fn on_summary(&mut self, summary: &EndpointSummary) {
        self.line(&summary_line(summary));
    }
    fn on_stop(&mut self, stats: &SessionStats) {
        if let Err(e) = self.out.flush() {
            tracing::warn!("console flush failed: {}", e);
        }
        tracing::info!(
            seen = stats.seen,
            filtered = stats.filtered,
            delivered = stats.delivered,
            "capture stopped"
        );
    }
}
