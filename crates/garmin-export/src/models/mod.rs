pub mod activity;
pub mod frame;
pub mod health;

pub use activity::flatten_activity;
pub use frame::{render_cell, ActivityTable, Cell, DailyFrame, Table};
pub use health::{
    DailyHrv, DailyIntensityMinutes, DailyRecord, DailySleep, DailySteps, HrvBaseline,
    HrvSummaries,
};
