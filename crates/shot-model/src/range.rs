//! Shot frame ranges and the range lookup table.
//!
//! The table is a headerless CSV maintained by production:
//!
//! ```text
//! ep100,sq01,sh0010,10,100
//! ep100,sq01,sh0020,101,180
//! ```
//!
//! Columns 0..3 form the shot key (joined with `_`), columns 3 and 4 are the
//! inclusive start and end frames.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use shotline_common::error::ShotlineError;

/// Separator joining the first three columns into a shot key.
pub const KEY_SEPARATOR: &str = "_";

/// Frame range of a shot plus the derived playback step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShotRange {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl ShotRange {
    /// Build a range, deriving `step` from the bounds.
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            step: Self::step_for(start, end),
        }
    }

    /// Half the span, rounded down to a whole frame.
    ///
    /// An odd span gives a half-frame raw value which is first moved down by
    /// 0.5 and then truncated, e.g. `10..=101` → 45.5 → 45. Euclidean
    /// division is exactly that correction, including for inverted ranges.
    pub fn step_for(start: i64, end: i64) -> i64 {
        // Half of any i64 span is itself within i64.
        (i128::from(end) - i128::from(start)).div_euclid(2) as i64
    }
}

/// Errors raised while loading or reading a range table.
#[derive(Debug, thiserror::Error)]
pub enum RangeTableError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row} for shot '{key}' has no column {column}")]
    MissingColumn {
        row: usize,
        key: String,
        column: usize,
    },

    #[error("row {row} for shot '{key}' has a non-integer frame '{value}'")]
    InvalidFrame {
        row: usize,
        key: String,
        value: String,
    },
}

impl From<RangeTableError> for ShotlineError {
    fn from(err: RangeTableError) -> Self {
        ShotlineError::range_table(err.to_string())
    }
}

/// Look up `key` in `rows`, first match wins.
///
/// `Ok(None)` means no row carries the key; callers leave the frame range
/// untouched. A matching row with missing or non-numeric frames is an error.
pub fn resolve_range<R: AsRef<str>>(
    rows: &[Vec<R>],
    key: &str,
) -> Result<Option<ShotRange>, RangeTableError> {
    for (index, row) in rows.iter().enumerate() {
        let cells: Vec<&str> = row.iter().map(|cell| cell.as_ref()).collect();
        if cells.len() < 3 {
            continue;
        }
        if cells[..3].join(KEY_SEPARATOR) != key {
            continue;
        }

        let frame = |column: usize| -> Result<i64, RangeTableError> {
            let raw = cells
                .get(column)
                .ok_or_else(|| RangeTableError::MissingColumn {
                    row: index,
                    key: key.to_string(),
                    column,
                })?
                .trim();
            raw.parse::<i64>()
                .map_err(|_| RangeTableError::InvalidFrame {
                    row: index,
                    key: key.to_string(),
                    value: raw.to_string(),
                })
        };

        let range = ShotRange::new(frame(3)?, frame(4)?);
        tracing::info!(
            shot = key,
            start = range.start,
            end = range.end,
            "Found shot in range table"
        );
        return Ok(Some(range));
    }

    tracing::info!(shot = key, "Shot not found in range table");
    Ok(None)
}

/// An in-memory copy of a range table.
#[derive(Debug, Clone, Default)]
pub struct ShotRangeTable {
    rows: Vec<Vec<String>>,
}

impl ShotRangeTable {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Read a headerless CSV; rows may have any number of columns.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RangeTableError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, RangeTableError> {
        let file = std::fs::File::open(path).map_err(|e| RangeTableError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let table = Self::from_reader(file)?;
        tracing::debug!(path = %path.display(), rows = table.len(), "Loaded range table");
        Ok(table)
    }

    pub fn resolve(&self, key: &str) -> Result<Option<ShotRange>, RangeTableError> {
        resolve_range(&self.rows, key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
