//! Core types for amplitude-extract

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Timestamp format the export endpoint expects for `start`/`end`
pub const QUERY_FORMAT: &str = "%Y%m%dT%H";
/// Timestamp format used in human-readable log lines
pub const LOG_FORMAT: &str = "%Y-%m-%dT%H";

/// Granularity used to size export windows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// One window per hour
    Hour,
    /// One window per calendar day
    Day,
    /// One window per calendar month (default)
    #[default]
    Month,
}

impl TimeUnit {
    /// Start of the unit containing `at`
    pub fn floor(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let hour = truncate_to_hour(at);
        match self {
            TimeUnit::Hour => hour,
            TimeUnit::Day => hour - Duration::hours(i64::from(hour.hour())),
            TimeUnit::Month => start_of_day(
                at.date_naive()
                    .with_day(1)
                    .unwrap_or_else(|| at.date_naive()),
            ),
        }
    }

    /// Last hour of the unit containing `at`
    pub fn last_hour(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeUnit::Hour => self.floor(at),
            TimeUnit::Day => self.floor(at) + Duration::hours(23),
            TimeUnit::Month => {
                let floor = self.floor(at);
                match floor.checked_add_months(Months::new(1)) {
                    Some(next) => next - Duration::hours(1),
                    None => floor,
                }
            }
        }
    }

    /// `at` advanced by one unit; month arithmetic clamps to the end of shorter months
    pub fn advance(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeUnit::Hour => at.checked_add_signed(Duration::hours(1)),
            TimeUnit::Day => at.checked_add_signed(Duration::days(1)),
            TimeUnit::Month => at.checked_add_months(Months::new(1)),
        }
    }

    /// Whole units between `from` and `to`, truncated toward zero
    pub fn whole_units_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
        match self {
            TimeUnit::Hour => (to - from).num_hours(),
            TimeUnit::Day => (to - from).num_days(),
            TimeUnit::Month => {
                let mut months = i64::from(to.year() - from.year()) * 12
                    + i64::from(to.month()) - i64::from(from.month());
                while months > 0 {
                    let reached = u32::try_from(months)
                        .ok()
                        .and_then(|m| from.checked_add_months(Months::new(m)));
                    match reached {
                        Some(at) if at <= to => break,
                        _ => months -= 1,
                    }
                }
                months.max(0)
            }
        }
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hour" => Ok(TimeUnit::Hour),
            "day" => Ok(TimeUnit::Day),
            "month" => Ok(TimeUnit::Month),
            _ => Err(format!(
                "invalid time unit: {s}. Valid options: hour, day, month"
            )),
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeUnit::Hour => write!(f, "hour"),
            TimeUnit::Day => write!(f, "day"),
            TimeUnit::Month => write!(f, "month"),
        }
    }
}

fn truncate_to_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(at.date_naive()) + Duration::hours(i64::from(at.hour()))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Inclusive range of UTC calendar days to export
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` (or RFC 3339, of which only the UTC date is kept) bounds
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// First day of the range
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Midnight UTC of the first day
    pub fn start_instant(&self) -> DateTime<Utc> {
        start_of_day(self.start)
    }

    /// Last hour (23:00 UTC) of the last day
    pub fn end_instant(&self) -> DateTime<Utc> {
        start_of_day(self.end) + Duration::hours(23)
    }
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|e| Error::InvalidDate {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

/// One request window against the export endpoint
///
/// Both bounds are hour-aligned and inclusive, matching the endpoint's
/// `start`/`end` semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// First hour included
    pub start: DateTime<Utc>,
    /// Last hour included
    pub end: DateTime<Utc>,
    /// Granularity the window was derived from
    pub unit: TimeUnit,
}

impl TimeWindow {
    /// `start` query parameter (`YYYYMMDDTHH`)
    pub fn query_start(&self) -> String {
        self.start.format(QUERY_FORMAT).to_string()
    }

    /// `end` query parameter (`YYYYMMDDTHH`)
    pub fn query_end(&self) -> String {
        self.end.format(QUERY_FORMAT).to_string()
    }

    /// Deterministic identity, also the staged chunk's file stem
    pub fn chunk_id(&self) -> String {
        format!("{}--{}", self.query_start(), self.query_end())
    }

    /// Staged chunk file name
    pub fn file_name(&self) -> String {
        format!("{}.zip", self.chunk_id())
    }

    /// Human-readable `start → end` label
    pub fn label(&self) -> String {
        format!(
            "{} → {}",
            self.start.format(LOG_FORMAT),
            self.end.format(LOG_FORMAT)
        )
    }
}

/// Compressed archive downloaded for one window
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedChunk {
    /// Window the archive covers
    pub window: TimeWindow,
    /// Location in the staging directory
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
}

impl StagedChunk {
    /// Identity used to name the chunk's staging folder
    pub fn id(&self) -> String {
        chunk_id_from_path(&self.path).unwrap_or_else(|| self.window.chunk_id())
    }
}

/// File stem up to the first `.` (`20210917T00--20210917T23.zip` -> `20210917T00--20210917T23`)
pub fn chunk_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.split('.').next().map(str::to_string)
}

/// Inner compressed payload unpacked from a chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnpackedEntry {
    /// Identity of the chunk the entry came from
    pub chunk_id: String,
    /// Location in the chunk's staging folder
    pub path: PathBuf,
}

impl UnpackedEntry {
    /// Output file name with the partition prefix and `.gz` suffix removed
    pub fn output_name(&self) -> String {
        let base = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        logical_output_name(&base)
    }
}

/// `<partition>_<logical>.json.gz` -> `<logical>.json`
///
/// Names without a partition prefix keep their full base name.
pub fn logical_output_name(file_name: &str) -> String {
    let logical = match file_name.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => file_name,
    };
    match logical.find(".gz") {
        Some(idx) => logical[..idx].to_string(),
        None => logical.to_string(),
    }
}

/// Decompressed output written to the destination directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFile {
    /// Output path
    pub path: PathBuf,
    /// Newline-terminated records in the file
    pub records: u64,
}

/// What happened to one window during fetching
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WindowOutcome {
    /// Archive written to staging
    Staged {
        /// Bytes written
        bytes: u64,
        /// Retries needed before the successful attempt
        retries: u32,
    },
    /// Endpoint answered successfully with an empty body
    Empty,
    /// Endpoint reported no data for this window
    NotFound {
        /// HTTP status returned
        status: u16,
    },
    /// Fetch failed after exhausting retries or with a permanent error
    Failed {
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        /// Error message
        reason: String,
    },
}

/// Per-window result recorded in the run summary
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowReport {
    /// The window requested
    pub window: TimeWindow,
    /// Outcome of fetching it
    pub outcome: WindowOutcome,
}

/// Pipeline stage, entered strictly in order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Splitting the date range into windows
    Planning,
    /// Downloading window archives
    Fetching,
    /// Unpacking staged archives
    Unpacking,
    /// Decompressing inner payloads
    Decoding,
    /// Removing staging artifacts and building the summary
    Finalizing,
    /// Run finished
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Planning => "planning",
            Stage::Fetching => "fetching",
            Stage::Unpacking => "unpacking",
            Stage::Decoding => "decoding",
            Stage::Finalizing => "finalizing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Terminal artifact of a run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Output files in the destination directory, sorted by path
    pub output_files: Vec<PathBuf>,
    /// Records decoded during this run
    pub event_count: u64,
    /// Per-window fetch results, in window order
    pub windows: Vec<WindowReport>,
}

impl RunSummary {
    /// Number of windows whose archive was staged
    pub fn staged_windows(&self) -> usize {
        self.windows
            .iter()
            .filter(|w| matches!(w.outcome, WindowOutcome::Staged { .. }))
            .count()
    }

    /// Windows that produced no archive (not found, empty, or failed)
    pub fn skipped_windows(&self) -> usize {
        self.windows.len() - self.staged_windows()
    }
}
