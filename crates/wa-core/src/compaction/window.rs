//! Hourly compaction windows.
//!
//! A tick fired at reference time `T` compacts the last fully elapsed hour
//! (`T - 1h`) and discards the holding table left by the tick before that
//! (`T - 2h`). Only the calendar hour of each window matters.

use crate::timefmt;
use chrono::{DateTime, Datelike, DurationRound, TimeDelta, Timelike, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use wa_common::{Error, Result};

/// A single calendar hour in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompactionWindow {
    start: DateTime<Utc>,
}

impl CompactionWindow {
    /// The hour containing `instant`.
    pub fn containing(instant: DateTime<Utc>) -> Option<Self> {
        instant
            .duration_trunc(TimeDelta::hours(1))
            .ok()
            .map(|start| Self { start })
    }

    /// The window `hours` away from this one; `None` outside chrono's range.
    pub fn checked_offset(&self, hours: i64) -> Option<Self> {
        self.start
            .checked_add_signed(TimeDelta::hours(hours))
            .map(|start| Self { start })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }

    pub fn month(&self) -> u32 {
        self.start.month()
    }

    pub fn day(&self) -> u32 {
        self.start.day()
    }

    pub fn hour(&self) -> u32 {
        self.start.hour()
    }

    /// Zero-padded `YYYYMMDDHH`, used to name per-hour tables.
    pub fn suffix(&self) -> String {
        self.start.format("%Y%m%d%H").to_string()
    }

    /// Partition predicate selecting exactly this hour.
    pub fn predicate(&self) -> String {
        format!(
            "year={} AND month={} AND day={} AND hour={}",
            self.year(),
            self.month(),
            self.day(),
            self.hour()
        )
    }
}

impl fmt::Display for CompactionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format("%Y-%m-%dT%H"))
    }
}

impl Serialize for CompactionWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("CompactionWindow", 4)?;
        s.serialize_field("year", &self.year())?;
        s.serialize_field("month", &self.month())?;
        s.serialize_field("day", &self.day())?;
        s.serialize_field("hour", &self.hour())?;
        s.end()
    }
}

/// The windows one tick operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickWindows {
    /// Hour whose holding table is dropped (`reference - 2h`).
    pub cleanup: CompactionWindow,
    /// Hour being compacted (`reference - 1h`).
    pub target: CompactionWindow,
}

impl TickWindows {
    /// Derive the windows from an already parsed reference instant.
    pub fn from_reference(reference: DateTime<Utc>) -> Option<Self> {
        let current = CompactionWindow::containing(reference)?;
        Some(Self {
            cleanup: current.checked_offset(-2)?,
            target: current.checked_offset(-1)?,
        })
    }

    /// `target - 1h`, `target`, `target + 1h`: the hours registered as
    /// partitions so late-arriving objects are not missed.
    pub fn partition_hours(&self) -> Option<[CompactionWindow; 3]> {
        partition_hours(&self.target)
    }
}

/// The three hours centred on `window`, oldest first.
pub fn partition_hours(window: &CompactionWindow) -> Option<[CompactionWindow; 3]> {
    Some([
        window.checked_offset(-1)?,
        *window,
        window.checked_offset(1)?,
    ])
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` reference time and derive the tick windows.
///
/// # Errors
///
/// Returns [`Error::MalformedReferenceTime`] when the value is not in the
/// fixed format.
pub fn windows_for(reference: &str) -> Result<TickWindows> {
    let malformed = || Error::MalformedReferenceTime {
        value: reference.to_string(),
    };
    let instant = timefmt::parse_fixed(reference).ok_or_else(malformed)?;
    TickWindows::from_reference(instant).ok_or_else(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hour(windows: &CompactionWindow) -> (i32, u32, u32, u32) {
        (windows.year(), windows.month(), windows.day(), windows.hour())
    }

    #[test]
    fn test_reference_windows() {
        let w = windows_for("2020-02-28T03:05:00Z").unwrap();
        assert_eq!(hour(&w.target), (2020, 2, 28, 2));
        assert_eq!(hour(&w.cleanup), (2020, 2, 28, 1));
    }

    #[test]
    fn test_windows_cross_midnight_and_month() {
        let w = windows_for("2020-03-01T00:05:00Z").unwrap();
        assert_eq!(hour(&w.target), (2020, 2, 29, 23));
        assert_eq!(hour(&w.cleanup), (2020, 2, 29, 22));

        let w = windows_for("2021-01-01T01:59:59Z").unwrap();
        assert_eq!(hour(&w.target), (2021, 1, 1, 0));
        assert_eq!(hour(&w.cleanup), (2020, 12, 31, 23));
    }

    #[test]
    fn test_malformed_reference_is_error() {
        for bad in [
            "2020-02-28 03:05:00",
            "yesterday",
            "2020-02-30T03:05:00Z",
            "2020-02-28T03:05:60Z",
        ] {
            assert!(matches!(
                windows_for(bad),
                Err(Error::MalformedReferenceTime { .. })
            ));
        }
    }

    #[test]
    fn test_partition_hours_around_target() {
        let w = windows_for("2020-02-28T03:05:00Z").unwrap();
        let hours: Vec<_> = w.partition_hours().unwrap().iter().map(hour).collect();
        assert_eq!(
            hours,
            vec![(2020, 2, 28, 1), (2020, 2, 28, 2), (2020, 2, 28, 3)]
        );
    }

    #[test]
    fn test_suffix_and_predicate() {
        let w = windows_for("2020-02-28T03:05:00Z").unwrap();
        assert_eq!(w.target.suffix(), "2020022802");
        assert_eq!(
            w.target.predicate(),
            "year=2020 AND month=2 AND day=28 AND hour=2"
        );
        assert_eq!(w.target.to_string(), "2020-02-28T02");
    }

    #[test]
    fn test_serializes_components() {
        let w = windows_for("2020-02-28T03:05:00Z").unwrap();
        let json = serde_json::to_value(w).unwrap();
        assert_eq!(json["target"]["hour"], 2);
        assert_eq!(json["cleanup"]["month"], 2);
    }

    #[test]
    fn test_containing_truncates() {
        let a = CompactionWindow::containing(timefmt::parse_fixed("2020-02-28T02:59:59Z").unwrap());
        let b = CompactionWindow::containing(timefmt::parse_fixed("2020-02-28T02:00:00Z").unwrap());
        assert_eq!(a, b);
    }
}
