//! In-memory tables written to the CSV outputs
//!
//! [`DailyFrame`] is keyed by calendar date and carries a fixed column list;
//! [`ActivityTable`] holds one row per activity with whatever columns the API
//! returned.

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A single table cell. `Null` is written as an empty field.
pub type Cell = Value;

/// Anything that can be appended to a CSV file
pub trait Table {
    /// Column names, index column first
    fn header(&self) -> Vec<String>;

    /// Rows aligned with [`Table::header`]
    fn records(&self) -> Vec<Vec<String>>;

    fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// Per-day rows keyed by calendar date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyFrame {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, HashMap<String, Cell>>,
}

impl DailyFrame {
    pub const INDEX: &'static str = "calendar_date";

    /// An empty frame with the given columns
    pub fn empty(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.rows.keys()
    }

    pub fn get(&self, date: NaiveDate, column: &str) -> Option<&Cell> {
        self.rows
            .get(&date)
            .and_then(|row| row.get(column))
            .filter(|v| !v.is_null())
    }

    /// Make sure a row exists for `date`, even if every cell stays empty
    pub fn ensure_row(&mut self, date: NaiveDate) {
        self.rows.entry(date).or_default();
    }

    /// Set one cell. Columns not yet in the frame are appended.
    pub fn set(&mut self, date: NaiveDate, column: &str, value: Cell) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
        self.rows
            .entry(date)
            .or_default()
            .insert(column.to_string(), value);
    }

    /// Outer join on the date index. The result has every date of either
    /// frame and the left columns followed by the right ones. A column present
    /// on both sides keeps the left value unless it is empty.
    pub fn outer_join(mut self, other: DailyFrame) -> DailyFrame {
        for column in other.columns {
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }

        for (date, row) in other.rows {
            let target = self.rows.entry(date).or_default();
            for (column, value) in row {
                match target.get(&column) {
                    Some(existing) if !existing.is_null() => {}
                    _ => {
                        target.insert(column, value);
                    }
                }
            }
        }

        self
    }
}

impl Table for DailyFrame {
    fn header(&self) -> Vec<String> {
        std::iter::once(Self::INDEX.to_string())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|(date, row)| {
                std::iter::once(date.format("%Y-%m-%d").to_string())
                    .chain(
                        self.columns
                            .iter()
                            .map(|c| row.get(c).map(render_cell).unwrap_or_default()),
                    )
                    .collect()
            })
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row per activity, indexed by local start time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityTable {
    columns: Vec<String>,
    rows: Vec<(String, HashMap<String, Cell>)>,
}

impl ActivityTable {
    pub const INDEX: &'static str = "startTimeLocal";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flattened activity. The index column is lifted out of the row.
    pub fn push(&mut self, mut row: BTreeMap<String, Cell>) {
        let index = row
            .remove(Self::INDEX)
            .map(|v| render_cell(&v))
            .unwrap_or_default();

        for column in row.keys() {
            if !self.columns.contains(column) {
                self.columns.push(column.clone());
            }
        }
        self.rows.push((index, row.into_iter().collect()));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Table for ActivityTable {
    fn header(&self) -> Vec<String> {
        std::iter::once(Self::INDEX.to_string())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|(index, row)| {
                std::iter::once(index.clone())
                    .chain(
                        self.columns
                            .iter()
                            .map(|c| row.get(c).map(render_cell).unwrap_or_default()),
                    )
                    .collect()
            })
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Text form of a cell as written to CSV
pub fn render_cell(value: &Cell) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
