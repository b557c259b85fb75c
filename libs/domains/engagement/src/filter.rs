use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::str::FromStr;

use crate::models::{DomainScope, EventKind};

/// Separator between the two ends of a `date` range.
const RANGE_SEPARATOR: &str = " to ";

/// Offset-less timestamp layouts, read as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Inclusive `[start, end]` window on an event's `date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Parses `"<start> to <end>"`. Anything else yields `None` and the
    /// filter is skipped.
    ///
    /// Each side is RFC 3339, an offset-less `YYYY-MM-DD[T ]HH:MM[:SS[.f]]`
    /// (UTC) or `YYYY-MM-DD`. A date-only token is midnight UTC on either
    /// side, so `2024-01-01 to 2024-01-31` stops at the start of the 31st.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split(RANGE_SEPARATOR);
        let start = parts.next()?;
        let end = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let start = parse_bound(start)?;
        let end = parse_bound(end)?;
        Some(Self { start, end })
    }

    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        *date >= self.start && *date <= self.end
    }
}

fn parse_bound(token: &str) -> Option<DateTime<Utc>> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(token) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(token, format).ok())
    {
        return Some(naive.and_utc());
    }

    let day = NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()?;
    Some(day.and_time(NaiveTime::MIN).and_utc())
}

/// Event selection shared by the feed count and page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub domain: DomainScope,
    /// Empty means every kind.
    pub kinds: Vec<EventKind>,
    pub date: Option<DateRange>,
}

impl EventFilter {
    pub fn new(domain: DomainScope) -> Self {
        Self {
            domain,
            kinds: Vec::new(),
            date: None,
        }
    }

    /// Keeps the recognized kinds, in request order without duplicates.
    pub fn with_actions<I, A>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<str>,
    {
        let mut kinds = Vec::new();
        for action in actions {
            if let Ok(kind) = EventKind::from_str(action.as_ref().trim()) {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        self.kinds = kinds;
        self
    }

    pub fn with_date(mut self, raw: Option<&str>) -> Self {
        self.date = raw.and_then(DateRange::parse);
        self
    }

    pub fn matches_kind(&self, kind: EventKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

/// Recipient selection for the plain and cold lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientFilter {
    pub domain: DomainScope,
    /// Inclusive upper bound on `last_seen`.
    pub last_seen_before: Option<DateTime<Utc>>,
}

impl RecipientFilter {
    pub fn new(domain: DomainScope) -> Self {
        Self {
            domain,
            last_seen_before: None,
        }
    }

    pub fn last_seen_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.last_seen_before = Some(cutoff);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn domain() -> DomainScope {
        DomainScope::parse("d1").unwrap()
    }

    #[test]
    fn test_date_only_bounds_are_midnight() {
        let range = DateRange::parse("2024-01-01 to 2024-01-31").unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap());
        assert!(range.contains(&range.end));
        assert!(!range.contains(&Utc.with_ymd_and_hms(2024, 1, 31, 18, 0, 0).unwrap()));
    }

    #[test]
    fn test_timestamp_forms() {
        let range = DateRange::parse("2024-01-01T10:00:00Z to 2024-01-01T12:00:00+02:00").unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());

        let naive = DateRange::parse("2024-03-01T08:30:00 to 2024-03-02").unwrap();
        assert_eq!(naive.start, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap());

        let minutes = DateRange::parse("2024-01-01T10:00 to 2024-01-02T00:00").unwrap();
        assert_eq!(minutes.start, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(minutes.end, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());

        let spaced = DateRange::parse("2024-01-01 10:00:00 to 2024-01-02 00:00:00.250").unwrap();
        assert_eq!(spaced.start, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(
            spaced.end,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + chrono::TimeDelta::milliseconds(250)
        );

        let spaced_minutes = DateRange::parse("2024-01-01 10:00 to 2024-01-01 11:30").unwrap();
        assert_eq!(spaced_minutes.end, Utc.with_ymd_and_hms(2024, 1, 1, 11, 30, 0).unwrap());
    }

    #[test]
    fn test_malformed_ranges_are_ignored() {
        for raw in [
            "",
            "2024-01-01",
            "2024-01-01 - 2024-01-31",
            "2024-01-01 to",
            "yesterday to today",
            "2024-01-01 to 2024-01-02 to 2024-01-03",
            "2024-13-01 to 2024-01-31",
        ] {
            assert!(DateRange::parse(raw).is_none(), "{:?} should not parse", raw);
        }
    }

    #[test]
    fn test_actions_drop_unknown_kinds() {
        let filter = EventFilter::new(domain()).with_actions(["opened", "bogus", "clicked", "opened"]);
        assert_eq!(filter.kinds, vec![EventKind::Opened, EventKind::Clicked]);
        assert!(filter.matches_kind(EventKind::Clicked));
        assert!(!filter.matches_kind(EventKind::Delivered));
    }

    #[test]
    fn test_all_invalid_actions_mean_no_filter() {
        let all_invalid = EventFilter::new(domain()).with_actions(["bogus", "OPENED"]);
        let none = EventFilter::new(domain()).with_actions(Vec::<String>::new());
        assert_eq!(all_invalid, none);
        assert!(all_invalid.matches_kind(EventKind::Bounced));
    }

    #[test]
    fn test_with_date_skips_unparseable() {
        let filter = EventFilter::new(domain()).with_date(Some("last week"));
        assert!(filter.date.is_none());
        let filter = EventFilter::new(domain()).with_date(None);
        assert!(filter.date.is_none());
    }
}
