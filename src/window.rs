// src/window.rs
//! Discovery window and the temporal filter built on it.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ContentCandidate;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 14;

pub const ENV_WEEK_START: &str = "DISCOVERY_WEEK_START";
pub const ENV_WEEK_END: &str = "DISCOVERY_WEEK_END";

/// Inclusive `[start, end]` window over publication timestamps.
///
/// A trailing window remembers its lookback so a run can re-anchor it on the
/// clock it actually uses; explicit day windows never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(skip)]
    trailing_days: Option<i64>,
}

impl DiscoveryWindow {
    /// `now - days .. now`
    pub fn trailing(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: now - Duration::days(days),
            end: now,
            trailing_days: Some(days),
        }
    }

    pub fn is_trailing(&self) -> bool {
        self.trailing_days.is_some()
    }

    /// The same window as seen at `now`: trailing windows end at `now`,
    /// day windows are returned unchanged.
    pub fn anchored(&self, now: DateTime<Utc>) -> Self {
        match self.trailing_days {
            Some(days) => Self::trailing(now, days),
            None => *self,
        }
    }

    pub fn default_at(now: DateTime<Utc>) -> Self {
        Self::trailing(now, DEFAULT_LOOKBACK_DAYS)
    }

    /// Calendar-day window: `start` at midnight through the last instant of `end`.
    pub fn from_days(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(anyhow!("window end {end} is before start {start}"));
        }
        let start = Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN));
        let end = Utc.from_utc_datetime(&end.and_time(NaiveTime::MIN)) + Duration::days(1)
            - Duration::nanoseconds(1);
        Ok(Self {
            start,
            end,
            trailing_days: None,
        })
    }

    /// Explicit bounds when both are given, the trailing default otherwise.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        match (start, end) {
            (Some(s), Some(e)) => Self::from_days(s, e),
            (None, None) => Ok(Self::default_at(now)),
            _ => Err(anyhow!("window needs both start and end, or neither")),
        }
    }

    /// Read `DISCOVERY_WEEK_START` / `DISCOVERY_WEEK_END`; trailing default when unset.
    pub fn from_env(now: DateTime<Utc>) -> Result<Self> {
        let start = std::env::var(ENV_WEEK_START).ok().filter(|s| !s.trim().is_empty());
        let end = std::env::var(ENV_WEEK_END).ok().filter(|s| !s.trim().is_empty());
        let start = start
            .as_deref()
            .map(parse_day)
            .transpose()
            .with_context(|| format!("parsing {ENV_WEEK_START}"))?;
        let end = end
            .as_deref()
            .map(parse_day)
            .transpose()
            .with_context(|| format!("parsing {ENV_WEEK_END}"))?;
        Self::resolve(start, end, now)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Accepts `YYYY-MM-DD` or a full ISO datetime (the date part is used).
pub fn parse_day(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.date())
        .map_err(|e| anyhow!("invalid date `{s}`: {e}"))
}

/// Keep candidates published inside the window.
pub fn filter_recent(candidates: Vec<ContentCandidate>, window: &DiscoveryWindow) -> Vec<ContentCandidate> {
    candidates
        .into_iter()
        .filter(|c| {
            let keep = window.contains(c.published_at);
            if !keep {
                tracing::debug!(url = %c.canonical_url, published = %c.published_at, "outside window");
            }
            keep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn day_window_includes_whole_end_day() {
        let w = DiscoveryWindow::from_days(
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        )
        .unwrap();
        assert!(w.contains(ymd_hms(2025, 1, 6, 0, 0, 0)));
        assert!(w.contains(ymd_hms(2025, 1, 12, 23, 59, 59)));
        assert!(!w.contains(ymd_hms(2025, 1, 13, 0, 0, 0)));
        assert!(!w.contains(ymd_hms(2025, 1, 5, 23, 59, 59)));
    }

    #[test]
    fn reversed_days_are_rejected() {
        let r = DiscoveryWindow::from_days(
            NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        );
        assert!(r.is_err());
    }

    #[test]
    fn trailing_default_is_fourteen_days() {
        let now = ymd_hms(2025, 3, 1, 12, 0, 0);
        let w = DiscoveryWindow::default_at(now);
        assert_eq!(w.end, now);
        assert_eq!(w.start, ymd_hms(2025, 2, 15, 12, 0, 0));
        assert!(w.contains(now));
    }

    #[test]
    fn trailing_windows_follow_the_run_clock() {
        let requested = ymd_hms(2025, 3, 1, 12, 0, 0);
        let later = ymd_hms(2025, 3, 1, 12, 2, 30);
        let w = DiscoveryWindow::default_at(requested).anchored(later);
        assert!(w.is_trailing());
        assert_eq!(w.end, later);
        assert_eq!(w.start, ymd_hms(2025, 2, 15, 12, 2, 30));

        let days = DiscoveryWindow::from_days(
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        )
        .unwrap();
        assert_eq!(days.anchored(later), days);
    }

    #[test]
    fn half_open_bounds_are_an_error() {
        let now = Utc::now();
        let d = NaiveDate::from_ymd_opt(2025, 1, 6);
        assert!(DiscoveryWindow::resolve(d, None, now).is_err());
    }

    #[test]
    fn parse_day_accepts_datetimes() {
        assert_eq!(
            parse_day("2025-01-06T10:00:00").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
        );
        assert_eq!(
            parse_day(" 2025-01-06 ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
        );
        assert!(parse_day("last week").is_err());
    }
}
