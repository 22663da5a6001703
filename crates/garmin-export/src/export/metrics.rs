//! Daily health metric fetchers
//!
//! Every metric is read from a Connect `stats` endpoint that answers for a
//! window of at most [`PAGE_SIZE`] days. Longer periods are split into pages
//! walking back from the end date, the same way garth's `Stats.list` does.

use chrono::{Duration, NaiveDate};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::Session;
use crate::error::{GarminError, Result};
use crate::models::{
    DailyFrame, DailyIntensityMinutes, DailyRecord, DailySleep, DailySteps, HrvSummaries,
};

/// Largest window the stats endpoints accept in one request
pub const PAGE_SIZE: u32 = 28;

/// The daily metrics exported to the health file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Steps,
    Sleep,
    IntensityMinutes,
    Hrv,
}

impl Metric {
    /// Join order of the health frame
    pub const ALL: [Metric; 4] = [
        Metric::Steps,
        Metric::Sleep,
        Metric::IntensityMinutes,
        Metric::Hrv,
    ];

    /// Name used in log messages
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Steps => "steps",
            Metric::Sleep => "sleep",
            Metric::IntensityMinutes => "Daily Intensity",
            Metric::Hrv => "HRV",
        }
    }

    /// Output columns contributed by this metric, excluding the date index
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Metric::Steps => &["total_steps", "total_distance", "step_goal"],
            Metric::Sleep => &["sleep_quality"],
            Metric::IntensityMinutes => &[
                "intensity_minutes_goal",
                "moderate_intensity_minutes",
                "vigorous_intensity_minutes",
                "intensity_minutes",
            ],
            Metric::Hrv => &[
                "weekly_avg",
                "last_night_avg",
                "last_night_5_min_high",
                "status",
                "feedback_phrase",
                "low_upper",
                "balanced_low",
                "balanced_upper",
                "marker_value",
            ],
        }
    }

    fn path(&self, start: NaiveDate, end: NaiveDate) -> String {
        let prefix = match self {
            Metric::Steps => "/usersummary-service/stats/steps/daily",
            Metric::Sleep => "/wellness-service/stats/daily/sleep/score",
            Metric::IntensityMinutes => "/usersummary-service/stats/im/daily",
            Metric::Hrv => "/hrv-service/hrv/daily",
        };
        format!("{}/{}/{}", prefix, start, end)
    }

    /// Steps and sleep scores come back stamped one day late
    fn date_offset(&self) -> Duration {
        match self {
            Metric::Steps | Metric::Sleep => Duration::days(-1),
            Metric::IntensityMinutes | Metric::Hrv => Duration::zero(),
        }
    }

    /// Empty frame with this metric's columns, used when a fetch fails
    pub fn placeholder(&self) -> DailyFrame {
        DailyFrame::empty(self.columns())
    }

    /// Whether a page holds no daily records
    pub fn is_empty_page(&self, page: &Value) -> bool {
        let records = match self {
            Metric::Hrv => page.get("hrvSummaries"),
            _ => Some(page),
        };
        matches!(records, Some(Value::Array(items)) if items.is_empty())
    }

    /// Turn the raw JSON pages of this metric into a frame
    pub fn normalize(&self, pages: Vec<Value>) -> Result<DailyFrame> {
        match self {
            Metric::Steps => self.frame_from(parse_lists::<DailySteps>(pages)?),
            Metric::Sleep => self.frame_from(parse_lists::<DailySleep>(pages)?),
            Metric::IntensityMinutes => {
                self.frame_from(parse_lists::<DailyIntensityMinutes>(pages)?)
            }
            Metric::Hrv => {
                let mut records = Vec::new();
                for page in pages {
                    let summaries: HrvSummaries = serde_json::from_value(page)?;
                    records.extend(summaries.hrv_summaries);
                }
                self.frame_from(records)
            }
        }
    }

    fn frame_from<R: DailyRecord>(&self, records: Vec<R>) -> Result<DailyFrame> {
        let mut frame = self.placeholder();
        for record in records {
            let date = record
                .calendar_date()
                .checked_add_signed(self.date_offset())
                .ok_or_else(|| GarminError::invalid_response("calendar date out of range"))?;
            frame.ensure_row(date);
            for (column, value) in record.cells() {
                frame.set(date, column, value);
            }
        }
        Ok(frame)
    }
}

fn parse_lists<T: DeserializeOwned>(pages: Vec<Value>) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for page in pages {
        let parsed: Vec<T> = serde_json::from_value(page)?;
        records.extend(parsed);
    }
    Ok(records)
}

/// Request windows covering `period` days ending at `end`, oldest first
pub fn page_windows(end: NaiveDate, period: u32, page_size: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let page_size = page_size.max(1);
    let mut windows = Vec::new();
    let mut window_end = end;
    let mut remaining = period;

    while remaining > 0 {
        let days = remaining.min(page_size);
        let window_start = window_end - Duration::days(i64::from(days) - 1);
        windows.push((window_start, window_end));
        window_end = window_start - Duration::days(1);
        remaining -= days;
    }

    windows.reverse();
    windows
}

/// Outcome of one metric fetch. On failure `frame` is the placeholder and
/// `error` holds the cause.
#[derive(Debug)]
pub struct MetricFrame {
    pub metric: Metric,
    pub frame: DailyFrame,
    pub error: Option<GarminError>,
}

impl MetricFrame {
    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }
}

/// Fetch and normalize one metric, propagating any failure
pub async fn try_fetch_metric(
    session: &Session,
    metric: Metric,
    end: NaiveDate,
    period: u32,
) -> Result<DailyFrame> {
    let mut pages = Vec::new();
    // Newest window first; an empty page means nothing older exists either
    for (start, end) in page_windows(end, period, PAGE_SIZE).into_iter().rev() {
        let page: Value = session
            .client()
            .get_json(session.token(), &metric.path(start, end))
            .await?;
        if metric.is_empty_page(&page) {
            tracing::debug!(
                metric = metric.name(),
                %start,
                %end,
                "empty page, not paging further back"
            );
            break;
        }
        pages.push(page);
    }
    pages.reverse();
    metric.normalize(pages)
}

/// Fetch one metric for `period` days ending at `end`. Never fails: errors are
/// logged and replaced by the metric's placeholder frame.
pub async fn fetch_metric(session: &Session, metric: Metric, end: NaiveDate, period: u32) -> MetricFrame {
    tracing::debug!("Extract {}", metric.name());

    match try_fetch_metric(session, metric, end, period).await {
        Ok(frame) => MetricFrame {
            metric,
            frame,
            error: None,
        },
        Err(error) => {
            tracing::debug!(metric = metric.name(), error = %error, "metric fetch failed");
            if error.is_session_rejected() {
                tracing::warn!("Garmin Connect rejected the session token");
            }
            tracing::info!("Missing {} for the current period", metric.name());
            MetricFrame {
                metric,
                frame: metric.placeholder(),
                error: Some(error),
            }
        }
    }
}
