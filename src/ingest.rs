//! CSV Ingestion
//!
//! Reads the emissions spreadsheet export and groups rows by well key.
//!
//! Layout (0-indexed columns):
//! - 0: well name
//! - 1: well key
//! - 2..=4: year, month, day
//! - 5..=20: four (volume, volume unit, mass, mass unit) quadruples, one
//!   per [`EmissionType`]

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Minimum number of columns a data row must carry.
pub const MIN_COLUMNS: usize = 21;

/// The four fixed categories of emission event tracked per well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EmissionType {
    Flaring,
    ColdVentilation,
    DieselFuel,
    FuelGas,
}

/// Column offsets of one emission type's measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub volume: usize,
    pub volume_unit: usize,
    pub mass: usize,
    pub mass_unit: usize,
}

impl EmissionType {
    /// Fixed processing order. Every well gets one node per entry.
    pub const ALL: [EmissionType; 4] = [
        EmissionType::Flaring,
        EmissionType::ColdVentilation,
        EmissionType::DieselFuel,
        EmissionType::FuelGas,
    ];

    /// Wire name, used as node type and in identity hashing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flaring => "Flaring",
            Self::ColdVentilation => "ColdVentilation",
            Self::DieselFuel => "DieselFuel",
            Self::FuelGas => "FuelGas",
        }
    }

    pub fn columns(&self) -> ColumnLayout {
        let (volume, volume_unit, mass, mass_unit) = match self {
            Self::Flaring => (5, 6, 7, 8),
            Self::ColdVentilation => (9, 10, 11, 12),
            Self::DieselFuel => (13, 14, 15, 16),
            Self::FuelGas => (17, 18, 19, 20),
        };
        ColumnLayout {
            volume,
            volume_unit,
            mass,
            mass_unit,
        }
    }
}

impl std::fmt::Display for EmissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One data row of the spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub name: String,
    pub well_key: String,
    pub year: String,
    pub month: String,
    pub day: String,
    /// Full column array for positional lookups.
    pub columns: Vec<String>,
}

impl RawRow {
    /// Trimmed value of column `idx`, `None` when absent or blank.
    pub fn cell(&self, idx: usize) -> Option<&str> {
        self.columns
            .get(idx)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    /// `YYYY-MM-DD` for this row.
    pub fn date(&self) -> String {
        build_date(&self.year, &self.month, &self.day)
    }
}

/// Rows belonging to one well, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct WellRows {
    pub well_key: String,
    pub rows: Vec<RawRow>,
}

impl WellRows {
    /// Display name of the well: the first row's name field.
    pub fn name(&self) -> &str {
        self.rows
            .first()
            .map(|r| r.name.as_str())
            .unwrap_or(self.well_key.as_str())
    }
}

/// Join year/month/day into `YYYY-MM-DD`. Parts are trimmed and month and
/// day left-padded with `0` to width 2; the text is otherwise kept as-is.
pub fn build_date(year: &str, month: &str, day: &str) -> String {
    format!("{}-{:0>2}-{:0>2}", year.trim(), month.trim(), day.trim())
}

/// Read all data rows from a CSV file. The header row is discarded.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;
    read_rows_from(file)
}

/// Read all data rows from any reader. Short or undecodable rows are
/// skipped with a warning.
pub fn read_rows_from<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(row = idx + 2, error = %e, "Skipping unreadable CSV row");
                continue;
            }
        };

        if record.len() < MIN_COLUMNS {
            warn!(
                row = idx + 2,
                columns = record.len(),
                "Row has fewer than {} columns, skipping: {:?}",
                MIN_COLUMNS,
                record.iter().collect::<Vec<_>>()
            );
            continue;
        }

        let columns: Vec<String> = record.iter().map(str::to_string).collect();
        rows.push(RawRow {
            name: columns[0].trim().to_string(),
            well_key: columns[1].trim().to_string(),
            year: columns[2].trim().to_string(),
            month: columns[3].trim().to_string(),
            day: columns[4].trim().to_string(),
            columns,
        });
    }

    debug!(rows = rows.len(), "CSV read complete");
    Ok(rows)
}

/// Partition rows by well key, ordered by first encounter.
/// Rows with an empty well key are dropped.
pub fn group_by_well(rows: Vec<RawRow>) -> Vec<WellRows> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<WellRows> = Vec::new();

    for row in rows {
        if row.well_key.is_empty() {
            continue;
        }
        match index.get(&row.well_key) {
            Some(&i) => groups[i].rows.push(row),
            None => {
                index.insert(row.well_key.clone(), groups.len());
                groups.push(WellRows {
                    well_key: row.well_key.clone(),
                    rows: vec![row],
                });
            }
        }
    }

    groups
}
