// Time windows used by /leaderboard, /export and /log

use chrono::{DateTime, Duration, Months, NaiveDate, TimeZone, Utc};

/// Half-open `[start, end)` range in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardPeriod {
    Weekly,
    Monthly { month: u32, year: i32 },
    Yearly { year: i32 },
    AllTime,
}

impl LeaderboardPeriod {
    /// `None` means no time filter
    pub fn range(&self, now: DateTime<Utc>) -> Option<TimeRange> {
        match *self {
            LeaderboardPeriod::AllTime => None,
            LeaderboardPeriod::Weekly => {
                let tomorrow = now.date_naive() + Duration::days(1);
                Some(TimeRange {
                    start: midnight(tomorrow - Duration::days(7)),
                    end: midnight(tomorrow),
                })
            }
            LeaderboardPeriod::Monthly { month, year } => {
                let start = first_of_month(year, month)?;
                let end = start.checked_add_months(Months::new(1))?;
                Some(TimeRange {
                    start: midnight(start),
                    end: midnight(end),
                })
            }
            LeaderboardPeriod::Yearly { year } => Some(TimeRange {
                start: midnight(first_of_month(year, 1)?),
                end: midnight(first_of_month(year + 1, 1)?),
            }),
        }
    }

    pub fn label(&self) -> String {
        match *self {
            LeaderboardPeriod::Weekly => "Weekly".to_string(),
            LeaderboardPeriod::Monthly { month, year } => first_of_month(year, month)
                .map(|d| d.format("%B %Y").to_string())
                .unwrap_or_else(|| format!("{month}/{year}")),
            LeaderboardPeriod::Yearly { year } => year.to_string(),
            LeaderboardPeriod::AllTime => "All Time".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ExportTimeframe {
    #[name = "Last 24 Hours"]
    Day,
    #[name = "Last 7 Days"]
    Week,
    #[name = "Last 30 Days"]
    Month,
    #[name = "Last 365 Days"]
    Year,
    #[name = "All Time"]
    All,
}

impl ExportTimeframe {
    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            ExportTimeframe::Day => now - Duration::hours(24),
            ExportTimeframe::Week => now - Duration::days(7),
            ExportTimeframe::Month => now - Duration::days(30),
            ExportTimeframe::Year => now - Duration::days(365),
            ExportTimeframe::All => Utc.timestamp_opt(0, 0).single().unwrap_or(now),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportTimeframe::Day => "Last 24 Hours",
            ExportTimeframe::Week => "Last 7 Days",
            ExportTimeframe::Month => "Last 30 Days",
            ExportTimeframe::Year => "Last 365 Days",
            ExportTimeframe::All => "All Time",
        }
    }

    /// Short form used in file names
    pub fn slug(self) -> &'static str {
        match self {
            ExportTimeframe::Day => "day",
            ExportTimeframe::Week => "week",
            ExportTimeframe::Month => "month",
            ExportTimeframe::Year => "year",
            ExportTimeframe::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum LogTimeframe {
    #[name = "Last 24 hours"]
    Last24h,
    #[name = "Last 7 days"]
    Last7d,
}

impl LogTimeframe {
    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            LogTimeframe::Last24h => now - Duration::hours(24),
            LogTimeframe::Last7d => now - Duration::days(7),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LogTimeframe::Last24h => "last 24 hours",
            LogTimeframe::Last7d => "last 7 days",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_weekly_covers_seven_utc_days_including_today() {
        let range = LeaderboardPeriod::Weekly.range(at(2025, 3, 10, 15)).unwrap();
        assert_eq!(range.start, at(2025, 3, 4, 0));
        assert_eq!(range.end, at(2025, 3, 11, 0));
    }

    #[test]
    fn test_monthly_wraps_year() {
        let range = LeaderboardPeriod::Monthly { month: 12, year: 2024 }
            .range(at(2025, 1, 1, 0))
            .unwrap();
        assert_eq!(range.start, at(2024, 12, 1, 0));
        assert_eq!(range.end, at(2025, 1, 1, 0));
    }

    #[test]
    fn test_invalid_month_has_no_range() {
        assert!(LeaderboardPeriod::Monthly { month: 13, year: 2024 }
            .range(at(2025, 1, 1, 0))
            .is_none());
        assert!(LeaderboardPeriod::AllTime.range(at(2025, 1, 1, 0)).is_none());
    }

    #[test]
    fn test_labels() {
        assert_eq!(LeaderboardPeriod::Monthly { month: 2, year: 2025 }.label(), "February 2025");
        assert_eq!(LeaderboardPeriod::Yearly { year: 2024 }.label(), "2024");
    }

    #[test]
    fn test_export_windows() {
        let now = at(2025, 3, 31, 12);
        assert_eq!(ExportTimeframe::Day.since(now), at(2025, 3, 30, 12));
        assert_eq!(ExportTimeframe::Month.since(now), at(2025, 3, 1, 12));
        assert_eq!(ExportTimeframe::Year.since(now), at(2024, 3, 31, 12));
        assert_eq!(ExportTimeframe::Year.since(at(2024, 3, 1, 0)), at(2023, 3, 2, 0));
        assert_eq!(ExportTimeframe::All.since(now).timestamp(), 0);
    }
}
