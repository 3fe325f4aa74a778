// Daily streaks over YYYY-MM-DD activity dates

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

use super::config::effective_date;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakResult {
    pub current: u32,
    pub longest: u32,
}

/// Computes the running and best streak relative to `today`.
///
/// Input order does not matter; duplicates and unparsable strings are ignored.
/// A streak stays alive through `today` if the last active day was yesterday.
pub fn calculate_streak<S: AsRef<str>>(dates: &[S], today: NaiveDate) -> StreakResult {
    let days: BTreeSet<NaiveDate> = dates
        .iter()
        .filter_map(|d| NaiveDate::parse_from_str(d.as_ref(), "%Y-%m-%d").ok())
        .collect();

    if days.is_empty() {
        return StreakResult::default();
    }

    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for &day in &days {
        run = match previous {
            Some(prev) if day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    let anchor = [today, today - Duration::days(1)]
        .into_iter()
        .find(|d| days.contains(d));

    let mut current = 0u32;
    if let Some(mut day) = anchor {
        while days.contains(&day) {
            current += 1;
            day -= Duration::days(1);
        }
    }

    StreakResult {
        current,
        longest: longest.max(current),
    }
}

/// Streak as of the current effective day (2 AM JST rollover)
pub fn calculate_streak_now<S: AsRef<str>>(dates: &[S]) -> StreakResult {
    calculate_streak(dates, effective_date())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_empty_and_garbage() {
        let empty: [&str; 0] = [];
        assert_eq!(calculate_streak(&empty, day("2025-01-10")), StreakResult::default());
        assert_eq!(
            calculate_streak(&["not-a-date", ""], day("2025-01-10")),
            StreakResult::default()
        );
    }

    #[test]
    fn test_current_counts_through_today() {
        let dates = ["2025-01-08", "2025-01-09", "2025-01-10"];
        let r = calculate_streak(&dates, day("2025-01-10"));
        assert_eq!(r, StreakResult { current: 3, longest: 3 });
    }

    #[test]
    fn test_yesterday_keeps_streak_alive() {
        let dates = ["2025-01-09", "2025-01-08"];
        let r = calculate_streak(&dates, day("2025-01-10"));
        assert_eq!(r.current, 2);
    }

    #[test]
    fn test_gap_breaks_current_but_not_longest() {
        let dates = [
            "2024-12-01", "2024-12-02", "2024-12-03", "2024-12-04",
            "2025-01-07",
        ];
        let r = calculate_streak(&dates, day("2025-01-10"));
        assert_eq!(r, StreakResult { current: 0, longest: 4 });
    }

    #[test]
    fn test_unsorted_duplicates() {
        let dates = ["2025-01-10", "2025-01-09", "2025-01-10", "2025-01-05", "2025-01-09"];
        let r = calculate_streak(&dates, day("2025-01-10"));
        assert_eq!(r, StreakResult { current: 2, longest: 2 });
    }

    #[test]
    fn test_month_and_leap_boundaries() {
        let dates = ["2024-02-28", "2024-02-29", "2024-03-01"];
        let r = calculate_streak(&dates, day("2024-03-01"));
        assert_eq!(r.current, 3);
        assert!(r.current <= r.longest);
    }

    #[test]
    fn test_streak_now_counts_the_effective_day() {
        let today = effective_date();
        let dates = [today.to_string(), (today - Duration::days(1)).to_string()];
        assert_eq!(calculate_streak_now(&dates), StreakResult { current: 2, longest: 2 });
        assert_eq!(calculate_streak_now::<&str>(&[]), StreakResult::default());
    }
}
