//! Range driver
//!
//! Walks the requested date range in fixed-size chunks. For each chunk the
//! four daily metrics are fetched, outer-joined on the calendar date and
//! appended to the health file, then the chunk's activities are appended to
//! the activities file. Failures of a single metric or of the activity list
//! never abort the run.

pub mod activities;
pub mod metrics;

pub use activities::{fetch_activities, PAGE_LIMIT};
pub use metrics::{fetch_metric, page_windows, try_fetch_metric, Metric, MetricFrame, PAGE_SIZE};

use chrono::{Duration, NaiveDate};

use crate::auth::Session;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::models::{DailyFrame, Table};
use crate::storage::append_table;

/// One request window of the range driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: NaiveDate,
    /// `start + days`, not clipped to the range end
    pub end: NaiveDate,
}

/// Split `[start, end]` into chunks of `days`. Consecutive chunks share their
/// boundary date and the last chunk may run past `end`.
pub fn plan_chunks(start: NaiveDate, end: NaiveDate, days: u32) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    if days == 0 {
        return chunks;
    }

    let step = Duration::days(i64::from(days));
    let mut current = start;
    while current <= end {
        let Some(chunk_end) = current.checked_add_signed(step) else {
            break;
        };
        chunks.push(Chunk {
            start: current,
            end: chunk_end,
        });
        current = chunk_end;
    }
    chunks
}

/// Counters reported at the end of an export
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub chunks: usize,
    pub health_rows: usize,
    pub activity_rows: usize,
    /// Metric fetches replaced by a placeholder
    pub missing_metrics: usize,
    /// Chunks whose activity list could not be fetched or written
    pub failed_activity_chunks: usize,
}

impl std::fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {}, Health rows: {}, Activities: {}",
            self.chunks, self.health_rows, self.activity_rows
        )?;
        if self.missing_metrics > 0 {
            write!(f, ", Missing metrics: {}", self.missing_metrics)?;
        }
        if self.failed_activity_chunks > 0 {
            write!(f, ", Failed activity chunks: {}", self.failed_activity_chunks)?;
        }
        Ok(())
    }
}

/// Drives one export run against an authenticated session
pub struct Exporter<'a> {
    session: &'a Session,
    config: &'a ExportConfig,
}

impl<'a> Exporter<'a> {
    pub fn new(session: &'a Session, config: &'a ExportConfig) -> Self {
        Self { session, config }
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        plan_chunks(self.config.start, self.config.end, self.config.chunk_days)
    }

    /// Export every chunk of the configured range.
    ///
    /// Only a failure to write the health file is fatal.
    pub async fn run(&self) -> Result<ExportSummary> {
        let mut summary = ExportSummary::default();

        for chunk in self.chunks() {
            tracing::info!("**** Getting Data for {} - {}", chunk.start, chunk.end);
            summary.chunks += 1;

            let (health, missing) = self.fetch_health(chunk).await;
            summary.missing_metrics += missing;
            summary.health_rows += append_table(&self.config.health_file, &health)?;

            match self.export_activities(chunk).await {
                Ok(rows) => summary.activity_rows += rows,
                Err(e) => {
                    tracing::debug!(error = %e, "activity export failed");
                    tracing::info!("No Activities for the current period");
                    summary.failed_activity_chunks += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Fetch and join all metrics for one chunk, returning the frame and the
    /// number of metrics that fell back to a placeholder.
    pub async fn fetch_health(&self, chunk: Chunk) -> (DailyFrame, usize) {
        let mut joined: Option<DailyFrame> = None;
        let mut missing = 0;

        for metric in Metric::ALL {
            let fetched = fetch_metric(self.session, metric, chunk.end, self.config.chunk_days).await;
            if fetched.is_placeholder() {
                missing += 1;
            }
            joined = Some(match joined {
                Some(frame) => frame.outer_join(fetched.frame),
                None => fetched.frame,
            });
        }

        (joined.unwrap_or_else(|| DailyFrame::empty(&[])), missing)
    }

    async fn export_activities(&self, chunk: Chunk) -> Result<usize> {
        let table = fetch_activities(
            self.session,
            chunk.start,
            chunk.end,
            self.config.activity_type,
        )
        .await?;

        if table.is_empty() {
            tracing::info!("No Activities for the current period");
            return Ok(0);
        }
        append_table(&self.config.activities_file, &table)
    }
}
