//! Trading session windows.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Major trading sessions, as UTC hour windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Sydney,
    Tokyo,
    London,
    NewYork,
}

impl Session {
    /// Session window as `[start, end)` UTC hours. Windows may wrap past
    /// midnight (Sydney).
    #[must_use]
    pub fn utc_hours(&self) -> (u32, u32) {
        match self {
            Self::Sydney => (21, 6),
            Self::Tokyo => (0, 9),
            Self::London => (7, 16),
            Self::NewYork => (12, 21),
        }
    }

    fn contains_hour(&self, hour: u32) -> bool {
        let (start, end) = self.utc_hours();
        hour_in_window(hour, start, end)
    }
}

fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        // wraps midnight
        hour >= start || hour < end
    }
}

/// Session filter configuration.
///
/// Empty `allowed_sessions` disables filtering. When both custom hours are
/// set they override the named session windows entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFilter {
    #[serde(default)]
    pub allowed_sessions: Vec<Session>,
    #[serde(default)]
    pub custom_start_hour: Option<u32>,
    #[serde(default)]
    pub custom_end_hour: Option<u32>,
    /// Offset applied to UTC before the hour check, for brokers whose
    /// server day differs from UTC.
    #[serde(default)]
    pub timezone_offset_hours: i64,
}

impl SessionFilter {
    /// Whether an instruction at `now` falls inside an allowed window.
    #[must_use]
    pub fn in_session(&self, now: DateTime<Utc>) -> bool {
        if self.allowed_sessions.is_empty()
            && (self.custom_start_hour.is_none() || self.custom_end_hour.is_none())
        {
            return true;
        }

        let shifted = now + chrono::Duration::hours(self.timezone_offset_hours);
        let hour = shifted.hour();

        if let (Some(start), Some(end)) = (self.custom_start_hour, self.custom_end_hour) {
            return hour_in_window(hour, start % 24, end % 24);
        }

        self.allowed_sessions.iter().any(|s| s.contains_hour(hour))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let filter = SessionFilter::default();
        for hour in 0..24 {
            assert!(filter.in_session(at_hour(hour)));
        }
    }

    #[test]
    fn test_london_window() {
        let filter = SessionFilter {
            allowed_sessions: vec![Session::London],
            ..Default::default()
        };
        assert!(!filter.in_session(at_hour(6)));
        assert!(filter.in_session(at_hour(7)));
        assert!(filter.in_session(at_hour(15)));
        assert!(!filter.in_session(at_hour(16)));
    }

    #[test]
    fn test_sydney_wraps_midnight() {
        let filter = SessionFilter {
            allowed_sessions: vec![Session::Sydney],
            ..Default::default()
        };
        assert!(filter.in_session(at_hour(22)));
        assert!(filter.in_session(at_hour(3)));
        assert!(!filter.in_session(at_hour(12)));
    }

    #[test]
    fn test_multiple_sessions_union() {
        let filter = SessionFilter {
            allowed_sessions: vec![Session::London, Session::NewYork],
            ..Default::default()
        };
        assert!(filter.in_session(at_hour(8)));
        assert!(filter.in_session(at_hour(20)));
        assert!(!filter.in_session(at_hour(3)));
    }

    #[test]
    fn test_custom_hours_override_sessions() {
        let filter = SessionFilter {
            allowed_sessions: vec![Session::London],
            custom_start_hour: Some(2),
            custom_end_hour: Some(4),
            ..Default::default()
        };
        assert!(filter.in_session(at_hour(3)));
        assert!(!filter.in_session(at_hour(8)));
    }

    #[test]
    fn test_timezone_offset_shifts_window() {
        let filter = SessionFilter {
            allowed_sessions: vec![Session::Tokyo], // 0..9 UTC
            timezone_offset_hours: 3,
            ..Default::default()
        };
        // 22:30 UTC + 3h = 01:30 -> inside Tokyo window
        assert!(filter.in_session(at_hour(22)));
        // 10:30 UTC + 3h = 13:30 -> outside
        assert!(!filter.in_session(at_hour(10)));
    }
}
