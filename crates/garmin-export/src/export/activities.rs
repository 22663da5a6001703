//! Activity list fetcher

use chrono::NaiveDate;
use serde_json::Value;

use crate::auth::Session;
use crate::config::ActivityKind;
use crate::error::Result;
use crate::models::{flatten_activity, ActivityTable};

const SEARCH_PATH: &str = "/activitylist-service/activities/search/activities";

/// Activities requested per page
pub const PAGE_LIMIT: u32 = 20;

/// Fetch every activity started between `start` and `end` (inclusive),
/// optionally restricted to one activity type.
pub async fn fetch_activities(
    session: &Session,
    start: NaiveDate,
    end: NaiveDate,
    kind: Option<ActivityKind>,
) -> Result<ActivityTable> {
    tracing::debug!("Extract Activities");

    let mut table = ActivityTable::new();
    let mut offset = 0u32;

    loop {
        let mut query = vec![
            ("startDate", start.to_string()),
            ("endDate", end.to_string()),
            ("start", offset.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(kind) = kind {
            query.push(("activityType", kind.as_str().to_string()));
        }

        let page: Vec<Value> = session
            .client()
            .get_json_with_query(session.token(), SEARCH_PATH, &query)
            .await?;

        let count = page.len();
        tracing::debug!(offset, count, "activity page");
        for activity in &page {
            table.push(flatten_activity(activity));
        }

        if count < PAGE_LIMIT as usize {
            break;
        }
        offset += PAGE_LIMIT;
    }

    Ok(table)
}
