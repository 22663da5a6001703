//! Output files
//!
//! Both exports are plain CSV files that only ever grow:
//!
//! ```text
//! ./consolidated_garmin_health_stats.csv   # one row per calendar day
//! ./garmin_activities.csv                  # one row per activity
//! ```
//!
//! Nothing is deduplicated; exporting an overlapping range twice writes the
//! overlapping rows twice.

mod csv;

pub use self::csv::{append_table, dropped_columns, existing_header};
