//! Destination path derivation
//!
//! Paths are a pure function of `(created_at, number, root)`, which is what makes
//! re-runs idempotent: the same record always maps to the same file. Calendar
//! arithmetic is done in UTC.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{BillingRecord, DownloadTarget, Window};

/// Artifact file extension
const ARTIFACT_EXTENSION: &str = "pdf";

/// Resolve where a record's artifact is stored.
///
/// Directory is `{root}/{year}`, filename is `{year}-{MM}-{DD}-{number}.pdf`.
/// No filesystem access happens here; the fetcher creates the directory right
/// before writing.
///
/// # Examples
///
/// ```
/// use invoice_dl::path_resolver::resolve;
/// use invoice_dl::BillingRecord;
/// use std::path::Path;
///
/// let record = BillingRecord {
///     id: "in_1".to_string(),
///     number: "ACME-0042".to_string(),
///     created_at: 1_686_830_400, // 2023-06-15T12:00:00Z
///     artifact_url: None,
/// };
/// let target = resolve(&record, Path::new("/invoices"));
/// assert_eq!(target.path(), Path::new("/invoices/2023/2023-06-15-ACME-0042.pdf"));
/// ```
pub fn resolve(record: &BillingRecord, root: &Path) -> DownloadTarget {
    let date = record_date(record.created_at);
    let year = date.year();

    DownloadTarget {
        record: record.clone(),
        directory: root.join(year.to_string()),
        filename: format!(
            "{}-{:02}-{:02}-{}.{}",
            year,
            date.month(),
            date.day(),
            sanitize_number(&record.number),
            ARTIFACT_EXTENSION
        ),
    }
}

/// Calendar date of a Unix timestamp.
///
/// Timestamps outside chrono's representable range fall back to the epoch.
fn record_date(created_at: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(created_at, 0).unwrap_or_else(|| {
        tracing::warn!(created_at, "Timestamp out of range, using epoch for partitioning");
        DateTime::<Utc>::default()
    })
}

/// Keep the display number from escaping its directory.
///
/// Separators are percent-encoded, and so is `%` itself, so distinct numbers never
/// share a filename.
fn sanitize_number(number: &str) -> String {
    let mut out = String::with_capacity(number.len());
    for c in number.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            '\0' => out.push_str("%00"),
            other => out.push(other),
        }
    }
    out
}

/// Window covering one calendar year in UTC: `[Jan 1 year, Jan 1 year+1)`.
pub fn year_window(year: i32) -> Result<Window> {
    let start = year_start(year)
        .ok_or_else(|| Error::config("year", format!("year {year} is out of range")))?;
    let end = year
        .checked_add(1)
        .and_then(year_start)
        .ok_or_else(|| Error::config("year", format!("year {year} is out of range")))?;
    Ok(Window::new(start, end))
}

fn year_start(year: i32) -> Option<i64> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc().timestamp())
}
