//! Daily health statistics as returned by the Connect `stats` endpoints
//!
//! Field names follow the API's camelCase JSON; each record knows how to turn
//! itself into the CSV cells of its metric.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frame::Cell;

/// A per-day record that contributes cells to the health frame
pub trait DailyRecord {
    fn calendar_date(&self) -> NaiveDate;

    /// `(column, value)` pairs, already renamed to the output column names
    fn cells(&self) -> Vec<(&'static str, Cell)>;
}

fn cell<T: Into<Value>>(value: Option<T>) -> Cell {
    value.map(Into::into).unwrap_or(Value::Null)
}

/// `/usersummary-service/stats/steps/daily/{start}/{end}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySteps {
    pub calendar_date: NaiveDate,
    #[serde(default)]
    pub total_steps: Option<i64>,
    /// Meters
    #[serde(default)]
    pub total_distance: Option<i64>,
    #[serde(default)]
    pub step_goal: Option<i64>,
}

impl DailyRecord for DailySteps {
    fn calendar_date(&self) -> NaiveDate {
        self.calendar_date
    }

    fn cells(&self) -> Vec<(&'static str, Cell)> {
        vec![
            ("total_steps", cell(self.total_steps)),
            ("total_distance", cell(self.total_distance)),
            ("step_goal", cell(self.step_goal)),
        ]
    }
}

/// `/wellness-service/stats/daily/sleep/score/{start}/{end}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySleep {
    pub calendar_date: NaiveDate,
    /// Overall sleep score
    #[serde(default)]
    pub value: Option<i64>,
}

impl DailyRecord for DailySleep {
    fn calendar_date(&self) -> NaiveDate {
        self.calendar_date
    }

    fn cells(&self) -> Vec<(&'static str, Cell)> {
        vec![("sleep_quality", cell(self.value))]
    }
}

/// `/usersummary-service/stats/im/daily/{start}/{end}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyIntensityMinutes {
    pub calendar_date: NaiveDate,
    #[serde(default)]
    pub weekly_goal: Option<i64>,
    #[serde(default)]
    pub moderate_value: Option<i64>,
    #[serde(default)]
    pub vigorous_value: Option<i64>,
}

impl DailyIntensityMinutes {
    /// Vigorous minutes count double toward the weekly goal
    pub fn intensity_minutes(&self) -> Option<i64> {
        self.vigorous_value?
            .checked_mul(2)?
            .checked_add(self.moderate_value?)
    }
}

impl DailyRecord for DailyIntensityMinutes {
    fn calendar_date(&self) -> NaiveDate {
        self.calendar_date
    }

    fn cells(&self) -> Vec<(&'static str, Cell)> {
        vec![
            ("intensity_minutes_goal", cell(self.weekly_goal)),
            ("moderate_intensity_minutes", cell(self.moderate_value)),
            ("vigorous_intensity_minutes", cell(self.vigorous_value)),
            ("intensity_minutes", cell(self.intensity_minutes())),
        ]
    }
}

/// Envelope of `/hrv-service/hrv/daily/{start}/{end}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HrvSummaries {
    pub hrv_summaries: Vec<DailyHrv>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyHrv {
    pub calendar_date: NaiveDate,
    #[serde(default)]
    pub weekly_avg: Option<i64>,
    #[serde(default)]
    pub last_night_avg: Option<i64>,
    #[serde(default)]
    pub last_night_5_min_high: Option<i64>,
    #[serde(default)]
    pub baseline: Option<HrvBaseline>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub feedback_phrase: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HrvBaseline {
    #[serde(default)]
    pub low_upper: Option<i64>,
    #[serde(default)]
    pub balanced_low: Option<i64>,
    #[serde(default)]
    pub balanced_upper: Option<i64>,
    #[serde(default)]
    pub marker_value: Option<f64>,
}

impl DailyRecord for DailyHrv {
    fn calendar_date(&self) -> NaiveDate {
        self.calendar_date
    }

    fn cells(&self) -> Vec<(&'static str, Cell)> {
        let baseline = self.baseline.clone().unwrap_or_default();
        vec![
            ("weekly_avg", cell(self.weekly_avg)),
            ("last_night_avg", cell(self.last_night_avg)),
            ("last_night_5_min_high", cell(self.last_night_5_min_high)),
            ("status", cell(self.status.clone())),
            ("feedback_phrase", cell(self.feedback_phrase.clone())),
            ("low_upper", cell(baseline.low_upper)),
            ("balanced_low", cell(baseline.balanced_low)),
            ("balanced_upper", cell(baseline.balanced_upper)),
            ("marker_value", cell(baseline.marker_value)),
        ]
    }
}
