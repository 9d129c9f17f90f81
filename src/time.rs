//! Time windows and the time-tiering policy
//!
//! A report request carries a time window expressed in the requester's local
//! wall clock. Partition indices, however, are keyed in UTC. For windows of a
//! week or more the window is adjusted by the configured UTC offset before it
//! is used for partition lookups; shorter windows are looked up as-is.
//!
//! The window's length also selects the aggregation granularity used for the
//! query, from raw events up to daily rollups.

use crate::error::{Error, Result};
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Minutes in one week; the boundary above which partition lookups use the
/// UTC-adjusted window
pub const MINUTES_IN_A_WEEK: i64 = 7 * 24 * 60;

/// Longest window served from raw events
pub const RAW_RANGE_MAX_MINUTES: i64 = 2 * 60;

/// Longest window served from 1-minute aggregation views
pub const ONE_MINUTE_RANGE_MAX_MINUTES: i64 = 6 * 60;

/// Aggregation granularity of the physical views backing a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    /// Unaggregated events
    Raw,
    /// 1-minute rollups
    OneMinute,
    /// 15-minute rollups
    FifteenMinutes,
    /// Daily rollups
    Day,
}

impl Granularity {
    /// View-name suffix for this granularity
    pub fn suffix(&self) -> &'static str {
        match self {
            Granularity::Raw => "_RAW",
            Granularity::OneMinute => "_1MIN",
            Granularity::FifteenMinutes => "_15MIN",
            Granularity::Day => "_DAY",
        }
    }

    /// View-name suffix under the data-tiering policy.
    ///
    /// Data-tiered tech packs keep no raw or 1-minute rollups; anything
    /// shorter than a day is served from the 15-minute views.
    pub fn data_tiered_suffix(&self) -> &'static str {
        match self {
            Granularity::Day => "_DAY",
            _ => "_15MIN",
        }
    }

    /// Select the granularity for a time window.
    ///
    /// A window in the 1-minute band falls back to raw when 1-minute
    /// aggregation is disabled globally.
    pub fn for_window(window: &TimeWindow, one_minute_enabled: bool) -> Granularity {
        let minutes = window.duration_minutes();
        if minutes <= RAW_RANGE_MAX_MINUTES {
            Granularity::Raw
        } else if minutes <= ONE_MINUTE_RANGE_MAX_MINUTES {
            if one_minute_enabled {
                Granularity::OneMinute
            } else {
                Granularity::Raw
            }
        } else if minutes < MINUTES_IN_A_WEEK {
            Granularity::FifteenMinutes
        } else {
            Granularity::Day
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Granularity::Raw => "RAW",
            Granularity::OneMinute => "1MIN",
            Granularity::FifteenMinutes => "15MIN",
            Granularity::Day => "DAY",
        })
    }
}

/// A requester's time window: local wall-clock bounds plus the UTC offset of
/// that wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
    utc_offset_minutes: i32,
}

impl TimeWindow {
    /// Create a time window; `end` must not precede `start`
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, utc_offset_minutes: i32) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidRequest(format!(
                "time window end {} precedes start {}",
                end, start
            )));
        }
        Ok(Self {
            start,
            end,
            utc_offset_minutes,
        })
    }

    /// Local start of the window
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Local end of the window
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// UTC offset of the requester's wall clock, in minutes east of UTC
    pub fn utc_offset_minutes(&self) -> i32 {
        self.utc_offset_minutes
    }

    /// Window length in whole minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Whether this window is long enough for partition lookups to require
    /// the UTC-adjusted bounds
    pub fn spans_week(&self) -> bool {
        self.duration_minutes() >= MINUTES_IN_A_WEEK
    }

    /// Window start converted to UTC
    pub fn utc_start(&self) -> NaiveDateTime {
        self.start - ChronoDuration::minutes(self.utc_offset_minutes as i64)
    }

    /// Window end converted to UTC
    pub fn utc_end(&self) -> NaiveDateTime {
        self.end - ChronoDuration::minutes(self.utc_offset_minutes as i64)
    }

    /// Bounds to use against partition indices: the UTC-adjusted bounds for
    /// windows of a week or more, the local bounds otherwise
    pub fn lookup_bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        if self.spans_week() {
            (self.utc_start(), self.utc_end())
        } else {
            (self.start, self.end)
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} .. {}] offset {:+}min",
            self.start, self.end, self.utc_offset_minutes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_reversed_window_rejected() {
        assert!(TimeWindow::new(dt(2024, 1, 2, 0, 0), dt(2024, 1, 1, 0, 0), 0).is_err());
    }

    #[test]
    fn test_duration_minutes() {
        let window = TimeWindow::new(dt(2024, 1, 1, 0, 0), dt(2024, 1, 1, 1, 30), 0).unwrap();
        assert_eq!(window.duration_minutes(), 90);
    }

    #[test]
    fn test_granularity_bands() {
        let raw = TimeWindow::new(dt(2024, 1, 1, 0, 0), dt(2024, 1, 1, 2, 0), 0).unwrap();
        assert_eq!(Granularity::for_window(&raw, true), Granularity::Raw);

        let one_min = TimeWindow::new(dt(2024, 1, 1, 0, 0), dt(2024, 1, 1, 5, 0), 0).unwrap();
        assert_eq!(Granularity::for_window(&one_min, true), Granularity::OneMinute);
        // 1-minute band degrades to raw when disabled globally
        assert_eq!(Granularity::for_window(&one_min, false), Granularity::Raw);

        let fifteen = TimeWindow::new(dt(2024, 1, 1, 0, 0), dt(2024, 1, 3, 0, 0), 0).unwrap();
        assert_eq!(
            Granularity::for_window(&fifteen, true),
            Granularity::FifteenMinutes
        );

        let day = TimeWindow::new(dt(2024, 1, 1, 0, 0), dt(2024, 1, 10, 0, 0), 0).unwrap();
        assert_eq!(Granularity::for_window(&day, true), Granularity::Day);
    }

    #[test]
    fn test_week_boundary_uses_day_views() {
        let window = TimeWindow::new(dt(2024, 1, 1, 0, 0), dt(2024, 1, 8, 0, 0), 0).unwrap();
        assert_eq!(window.duration_minutes(), MINUTES_IN_A_WEEK);
        assert_eq!(Granularity::for_window(&window, true), Granularity::Day);
        assert!(window.spans_week());
    }

    #[test]
    fn test_short_window_lookup_bounds_unadjusted() {
        let window = TimeWindow::new(dt(2024, 1, 1, 0, 0), dt(2024, 1, 2, 0, 0), 330).unwrap();
        let (start, end) = window.lookup_bounds();
        assert_eq!(start, window.start());
        assert_eq!(end, window.end());
    }

    #[test]
    fn test_nine_day_window_adjusted_by_offset() {
        // +05:30 requester, nine days: lookup bounds shift back 5h30m to UTC
        let window = TimeWindow::new(dt(2024, 3, 1, 0, 0), dt(2024, 3, 10, 0, 0), 330).unwrap();
        assert_eq!(Granularity::for_window(&window, true), Granularity::Day);
        let (start, end) = window.lookup_bounds();
        assert_eq!(start, dt(2024, 2, 29, 18, 30));
        assert_eq!(end, dt(2024, 3, 9, 18, 30));
        assert_eq!(window.start() - start, ChronoDuration::minutes(330));
        assert_eq!(window.end() - end, ChronoDuration::minutes(330));
    }

    #[test]
    fn test_negative_offset_adjusts_forward() {
        let window = TimeWindow::new(dt(2024, 3, 1, 0, 0), dt(2024, 3, 10, 0, 0), -120).unwrap();
        let (start, _) = window.lookup_bounds();
        assert_eq!(start, dt(2024, 3, 1, 2, 0));
    }
}
