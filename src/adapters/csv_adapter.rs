//! CSV file price adapter.
//!
//! One file per symbol, `<dir>/<symbol>.csv`, with a `timestamp,close`
//! header. Timestamps are RFC 3339, `YYYY-MM-DD HH:MM:SS` or plain dates
//! (midnight UTC).

use chrono::{DateTime, Days, Months, NaiveDate, NaiveDateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::error::DeskError;
use crate::ports::price_port::{PricePoint, PricePort};

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

/// Parses a `timestamp,close` CSV body into points sorted by time.
pub fn parse_series(symbol: &str, content: &str) -> Result<Vec<PricePoint>, DeskError> {
    let data_error = |reason: String| DeskError::PriceData {
        symbol: symbol.to_string(),
        reason,
    };

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut points = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| data_error(format!("CSV parse error: {e}")))?;
        let row = line + 2;

        let raw_ts = record
            .get(0)
            .ok_or_else(|| data_error(format!("missing timestamp column on row {row}")))?;
        let timestamp = parse_timestamp(raw_ts)
            .ok_or_else(|| data_error(format!("invalid timestamp '{raw_ts}' on row {row}")))?;

        let close: f64 = record
            .get(1)
            .ok_or_else(|| data_error(format!("missing close column on row {row}")))?
            .trim()
            .parse()
            .map_err(|e| data_error(format!("invalid close value on row {row}: {e}")))?;

        points.push(PricePoint { timestamp, close });
    }

    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

/// Reads a single series file.
pub fn read_series(path: &Path) -> Result<Vec<PricePoint>, DeskError> {
    let symbol = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content = fs::read_to_string(path).map_err(|e| DeskError::PriceData {
        symbol: symbol.clone(),
        reason: format!("failed to read {}: {e}", path.display()),
    })?;
    parse_series(&symbol, &content)
}

/// Earliest timestamp kept for `period`, counted back from `last`. `None`
/// keeps everything.
pub fn period_start(period: &str, last: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, String> {
    let start = match period {
        "max" => return Ok(None),
        "5d" => last.checked_sub_days(Days::new(5)),
        "1mo" => last.checked_sub_months(Months::new(1)),
        "3mo" => last.checked_sub_months(Months::new(3)),
        "6mo" => last.checked_sub_months(Months::new(6)),
        "1y" => last.checked_sub_months(Months::new(12)),
        "5y" => last.checked_sub_months(Months::new(60)),
        other => return Err(format!("unsupported period '{other}'")),
    };
    Ok(start)
}

impl PricePort for CsvPriceAdapter {
    /// A missing file yields an empty series. The interval is not resampled:
    /// each file holds a single resolution.
    fn fetch_series(
        &self,
        symbol: &str,
        period: &str,
        _interval: &str,
    ) -> Result<Vec<PricePoint>, DeskError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DeskError::PriceData {
                    symbol: symbol.to_string(),
                    reason: format!("failed to read {}: {e}", path.display()),
                });
            }
        };

        let mut points = parse_series(symbol, &content)?;
        let Some(last) = points.last().map(|p| p.timestamp) else {
            return Ok(points);
        };
        let start = period_start(period, last).map_err(|reason| DeskError::PriceData {
            symbol: symbol.to_string(),
            reason,
        })?;
        if let Some(start) = start {
            points.retain(|p| p.timestamp >= start);
        }
        Ok(points)
    }
}
