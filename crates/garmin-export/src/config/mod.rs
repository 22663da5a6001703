mod credentials;

pub use credentials::TokenStore;

use crate::error::{GarminError, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Environment variable overriding the token store directory
pub const TOKEN_STORE_ENV: &str = "GARMINTOKENS";

/// Token store used when `GARMINTOKENS` is unset (garth's default location)
pub const DEFAULT_TOKEN_STORE: &str = "~/.garminconnect";

/// Consolidated daily health metrics output
pub const HEALTH_FILE: &str = "consolidated_garmin_health_stats.csv";

/// Activity list output
pub const ACTIVITIES_FILE: &str = "garmin_activities.csv";

/// Days fetched per chunk unless overridden
pub const DEFAULT_CHUNK_DAYS: u32 = 31;

/// Activity type filter accepted by the activity list search
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum ActivityKind {
    Cycling,
    Running,
    Swimming,
    MultiSport,
    FitnessEquipment,
    Hiking,
    Walking,
    Other,
}

impl ActivityKind {
    /// Value of the `activityType` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Cycling => "cycling",
            ActivityKind::Running => "running",
            ActivityKind::Swimming => "swimming",
            ActivityKind::MultiSport => "multi_sport",
            ActivityKind::FitnessEquipment => "fitness_equipment",
            ActivityKind::Hiking => "hiking",
            ActivityKind::Walking => "walking",
            ActivityKind::Other => "other",
        }
    }
}

/// Everything the range driver needs to know about one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub chunk_days: u32,
    pub activity_type: Option<ActivityKind>,
    pub health_file: PathBuf,
    pub activities_file: PathBuf,
}

impl ExportConfig {
    /// Export `start..=end` into the default output files in the working directory
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            chunk_days: DEFAULT_CHUNK_DAYS,
            activity_type: None,
            health_file: PathBuf::from(HEALTH_FILE),
            activities_file: PathBuf::from(ACTIVITIES_FILE),
        }
    }

    pub fn with_chunk_days(mut self, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(GarminError::invalid_param("chunk size must be at least one day"));
        }
        self.chunk_days = days;
        Ok(self)
    }

    pub fn with_activity_type(mut self, kind: Option<ActivityKind>) -> Self {
        self.activity_type = kind;
        self
    }

    /// Write both output files into `dir` instead of the working directory
    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        self.health_file = dir.join(HEALTH_FILE);
        self.activities_file = dir.join(ACTIVITIES_FILE);
        self
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| GarminError::InvalidDateFormat(value.to_string()))
}

/// Resolve the token store directory from an explicit override (usually the
/// `GARMINTOKENS` environment variable) or the default.
pub fn token_store_dir(override_path: Option<&str>) -> Result<PathBuf> {
    let raw = override_path
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_TOKEN_STORE);
    expand_home(raw)
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> Result<PathBuf> {
    if path == "~" || path.starts_with("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| GarminError::config("Could not determine home directory"))?;
        let rest = path.trim_start_matches('~').trim_start_matches('/');
        return Ok(if rest.is_empty() { home } else { home.join(rest) });
    }
    Ok(PathBuf::from(path))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_activity_kind_accepts_query_spelling() {
        for kind in ActivityKind::value_variants() {
            let parsed = ActivityKind::from_str(kind.as_str(), false).unwrap();
            assert_eq!(parsed, *kind);
        }
        assert_eq!(
            ActivityKind::from_str("multi_sport", false).unwrap(),
            ActivityKind::MultiSport
        );
        assert_eq!(
            ActivityKind::from_str("fitness_equipment", false).unwrap(),
            ActivityKind::FitnessEquipment
        );
        assert!(ActivityKind::from_str("multi-sport", false).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(matches!(
            parse_date("2024/02/29"),
            Err(GarminError::InvalidDateFormat(_))
        ));
        assert!(parse_date("2023-02-29").is_err());
    }

    #[test]
    fn test_token_store_dir_override() {
        let dir = token_store_dir(Some("/tmp/garmin-tokens")).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/garmin-tokens"));
    }

    #[test]
    fn test_token_store_dir_default_expands_home() {
        let dir = token_store_dir(None).unwrap();
        assert!(dir.ends_with(".garminconnect"));
        assert!(!dir.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_blank_override_uses_default() {
        let dir = token_store_dir(Some("  ")).unwrap();
        assert!(dir.ends_with(".garminconnect"));
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("tokens").unwrap(), PathBuf::from("tokens"));
        assert_eq!(expand_home("~user").unwrap(), PathBuf::from("~user"));
    }

    #[test]
    fn test_export_config_defaults() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let config = ExportConfig::new(start, end);
        assert_eq!(config.chunk_days, 31);
        assert_eq!(config.health_file, PathBuf::from(HEALTH_FILE));
        assert_eq!(config.activities_file, PathBuf::from(ACTIVITIES_FILE));
        assert!(config.activity_type.is_none());
    }

    #[test]
    fn test_zero_chunk_days_rejected() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let result = ExportConfig::new(day, day).with_chunk_days(0);
        assert!(matches!(result, Err(GarminError::InvalidParameter(_))));
    }

    #[test]
    fn test_activity_kind_query_values() {
        assert_eq!(ActivityKind::MultiSport.as_str(), "multi_sport");
        assert_eq!(ActivityKind::FitnessEquipment.as_str(), "fitness_equipment");
        assert_eq!(ActivityKind::Running.as_str(), "running");
    }
}
