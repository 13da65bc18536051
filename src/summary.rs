//! Per-playbook execution records and the end-of-run report.

use std::fmt::{self, Write as _};
use std::time::Duration;

use strum::Display;

const RULE_WIDTH: usize = 70;

/// Outcome of one playbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PlaybookStatus {
    Success,
    Failed,
    Skipped,
}

impl PlaybookStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }
}

/// Result of running one playbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybookExecutionRecord {
    pub label: String,
    pub status: PlaybookStatus,
    pub duration: Duration,
    pub error: Option<String>,
}

impl PlaybookExecutionRecord {
    pub fn success(label: impl Into<String>, duration: Duration) -> Self {
        Self {
            label: label.into(),
            status: PlaybookStatus::Success,
            duration,
            error: None,
        }
    }

    pub fn failed(label: impl Into<String>, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: PlaybookStatus::Failed,
            duration,
            error: Some(error.into()),
        }
    }
}

/// Append-only, ordered list of playbook results for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    records: Vec<PlaybookExecutionRecord>,
}

impl ExecutionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: PlaybookExecutionRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[PlaybookExecutionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn count(&self, status: PlaybookStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn success_count(&self) -> usize {
        self.count(PlaybookStatus::Success)
    }

    pub fn failure_count(&self) -> usize {
        self.count(PlaybookStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Renders the tabular report printed after multi-playbook runs.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{}", heavy)?;
        writeln!(f, "EXECUTION SUMMARY")?;
        writeln!(f, "{}", heavy)?;
        writeln!(f, "{:<40} {:<10} {:<15}", "PLAYBOOK", "STATUS", "DURATION")?;
        writeln!(f, "{}", light)?;
        for record in &self.records {
            writeln!(
                f,
                "{:<40} {:<10} {:<15}",
                record.label,
                record.status.label(),
                format_duration(record.duration)
            )?;
        }
        writeln!(f, "{}", heavy)?;
        write!(
            f,
            "Total: {} | Success: {} | Failed: {}",
            self.len(),
            self.success_count(),
            self.failure_count()
        )
    }
}

/// Formats a duration rounded to whole seconds, e.g. `3s`, `1m5s`, `1h0m2s`.
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if duration.subsec_millis() >= 500 {
        secs += 1;
    }
    let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{}h{}m", hours, minutes);
    } else if minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    let _ = write!(out, "{}s", seconds);
    out
}
