//! Append-only CSV output
//!
//! A new file gets the table's header. An existing file keeps its header and
//! incoming rows are re-ordered to match it: columns the file does not know
//! are dropped (and reported at info), columns the table lacks are left empty.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;
use crate::models::Table;

/// Append `table` to the CSV at `path`, returning the number of rows written.
/// Empty tables leave the file untouched.
pub fn append_table(path: &Path, table: &dyn Table) -> Result<usize> {
    let records = table.records();
    if records.is_empty() {
        return Ok(0);
    }

    let incoming = table.header();
    match existing_header(path)? {
        None => write_new(path, &incoming, &records),
        Some(header) => append_aligned(path, &header, &incoming, &records),
    }
}

/// Header of an existing, non-empty file
pub fn existing_header(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() || fs::metadata(path)?.len() == 0 {
        return Ok(None);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(None);
    }
    Ok(Some(record.iter().map(str::to_string).collect()))
}

fn write_new(path: &Path, header: &[String], records: &[Vec<String>]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        crate::config::ensure_dir(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;

    tracing::debug!(path = %path.display(), rows = records.len(), "created CSV");
    Ok(records.len())
}

fn append_aligned(
    path: &Path,
    header: &[String],
    incoming: &[String],
    records: &[Vec<String>],
) -> Result<usize> {
    let positions: Vec<Option<usize>> = header
        .iter()
        .map(|column| incoming.iter().position(|c| c == column))
        .collect();

    let dropped = dropped_columns(header, incoming);
    if !dropped.is_empty() {
        tracing::info!(
            "Columns {} are not in the header of {} and were not written",
            dropped.join(", "),
            path.display()
        );
    }

    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    if !ends_with_newline(&mut file)? {
        file.write_all(b"\n")?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for record in records {
        let aligned = positions.iter().map(|pos| {
            pos.and_then(|i| record.get(i))
                .map(String::as_str)
                .unwrap_or("")
        });
        writer.write_record(aligned)?;
    }
    writer.flush()?;

    tracing::debug!(path = %path.display(), rows = records.len(), "appended to CSV");
    Ok(records.len())
}

/// Incoming columns that an existing header has no place for
pub fn dropped_columns<'a>(header: &[String], incoming: &'a [String]) -> Vec<&'a str> {
    incoming
        .iter()
        .filter(|c| !header.contains(c))
        .map(String::as_str)
        .collect()
}

fn ends_with_newline(file: &mut fs::File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
