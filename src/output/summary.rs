//! Per-province outcomes and the end-of-run summary
//!
//! Every province task ends in exactly one `ProvinceOutcome`. The summary
//! groups them for the console report and converts them into the rows stored
//! in `province_results`.

use crate::crawler::Truncation;
use crate::storage::{ProvinceResultRecord, ProvinceStatus};
use std::fmt;
use std::fmt::Write;
use std::time::Duration;

/// How one province task ended
#[derive(Debug, Clone)]
pub enum ProvinceOutcome {
    /// Walked to the villages without any truncation and persisted
    Complete { villages: usize },

    /// Persisted, but some branches were cut short
    Partial {
        villages: usize,
        truncations: Vec<Truncation>,
    },

    /// Aborted walk or failed transaction; nothing of this run was written
    Failed(String),

    /// The worker pool refused the task
    Rejected,
}

impl ProvinceOutcome {
    pub fn status(&self) -> ProvinceStatus {
        match self {
            Self::Complete { .. } => ProvinceStatus::Complete,
            Self::Partial { .. } => ProvinceStatus::Partial,
            Self::Failed(_) => ProvinceStatus::Failed,
            Self::Rejected => ProvinceStatus::Rejected,
        }
    }

    /// Village rows written for this province
    pub fn villages(&self) -> usize {
        match self {
            Self::Complete { villages } | Self::Partial { villages, .. } => *villages,
            Self::Failed(_) | Self::Rejected => 0,
        }
    }
}

impl fmt::Display for ProvinceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete { .. } => write!(f, "complete"),
            Self::Partial { truncations, .. } => {
                write!(f, "partial ({} truncated branches)", truncations.len())
            }
            Self::Failed(error) => write!(f, "failed: {}", error),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Result of one province task
#[derive(Debug, Clone)]
pub struct ProvinceReport {
    pub code: String,
    pub name: String,
    pub outcome: ProvinceOutcome,
}

impl ProvinceReport {
    pub fn new(code: impl Into<String>, name: impl Into<String>, outcome: ProvinceOutcome) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            outcome,
        }
    }

    /// Converts the report into its `province_results` row
    pub fn to_record(&self) -> ProvinceResultRecord {
        let (truncations, error_message) = match &self.outcome {
            ProvinceOutcome::Partial { truncations, .. } => (truncations.len() as u64, None),
            ProvinceOutcome::Failed(error) => (0, Some(error.clone())),
            ProvinceOutcome::Complete { .. } | ProvinceOutcome::Rejected => (0, None),
        };

        ProvinceResultRecord {
            province_code: self.code.clone(),
            province_name: self.name.clone(),
            status: self.outcome.status(),
            villages: self.outcome.villages() as u64,
            truncations,
            error_message,
        }
    }
}

/// Outcome of a whole crawl run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,

    /// Reports ordered by province code
    pub provinces: Vec<ProvinceReport>,

    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(run_id: i64, mut provinces: Vec<ProvinceReport>, elapsed: Duration) -> Self {
        provinces.sort_by(|a, b| a.code.cmp(&b.code));
        Self {
            run_id,
            provinces,
            elapsed,
        }
    }

    pub fn count(&self, status: ProvinceStatus) -> usize {
        self.provinces
            .iter()
            .filter(|p| p.outcome.status() == status)
            .count()
    }

    pub fn total_villages(&self) -> usize {
        self.provinces.iter().map(|p| p.outcome.villages()).sum()
    }

    /// True when some province has no data from this run
    pub fn has_failures(&self) -> bool {
        self.provinces.iter().any(|p| {
            matches!(
                p.outcome,
                ProvinceOutcome::Failed(_) | ProvinceOutcome::Rejected
            )
        })
    }

    /// True when every province walked and persisted without truncation
    pub fn is_complete(&self) -> bool {
        self.count(ProvinceStatus::Complete) == self.provinces.len()
    }
}

/// Formats the run summary as printed at the end of a crawl
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Crawl Run {} ===\n", summary.run_id);
    let _ = writeln!(out, "Provinces:");
    for report in &summary.provinces {
        let _ = writeln!(
            out,
            "  {} {}: {} ({} villages)",
            report.code,
            report.name,
            report.outcome,
            report.outcome.villages()
        );

        if let ProvinceOutcome::Partial { truncations, .. } = &report.outcome {
            for truncation in truncations {
                let _ = writeln!(out, "    - {}", truncation);
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Totals: {} complete, {} partial, {} failed, {} rejected",
        summary.count(ProvinceStatus::Complete),
        summary.count(ProvinceStatus::Partial),
        summary.count(ProvinceStatus::Failed),
        summary.count(ProvinceStatus::Rejected)
    );
    let _ = writeln!(
        out,
        "Villages written: {} in {:.1}s",
        summary.total_villages(),
        summary.elapsed.as_secs_f64()
    );

    out
}

/// Prints the run summary to stdout
pub fn print_run_summary(summary: &RunSummary) {
    print!("{}", format_run_summary(summary));
}
