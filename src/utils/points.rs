// Point weighting across media types

use crate::models::media::MediaType;
use crate::models::user::MediaStats;

/// Rounded points used by /stat, the heatmap and charts.
/// Unknown types count 1:1.
pub fn calculate_points(amount: f64, type_key: &str) -> i64 {
    let multiplier = MediaType::from_key(type_key)
        .map(MediaType::multiplier)
        .unwrap_or(1.0);
    (amount * multiplier).round() as i64
}

/// Unrounded points used for leaderboard ranking.
/// Unknown types are worth nothing there.
pub fn raw_points(amount: f64, type_key: &str) -> f64 {
    MediaType::from_key(type_key)
        .map(|m| amount * m.multiplier())
        .unwrap_or(0.0)
}

pub fn total_points<'a, I>(stats: I) -> i64
where
    I: IntoIterator<Item = (&'a String, &'a MediaStats)>,
{
    stats
        .into_iter()
        .map(|(key, s)| calculate_points(s.total, key))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_rounded_points() {
        assert_eq!(calculate_points(2.0, "anime"), 26);
        assert_eq!(calculate_points(10.0, "manga"), 3); // 2.5 rounds up
        assert_eq!(calculate_points(3500.0, "visual_novel"), 10);
        assert_eq!(calculate_points(45.0, "listening"), 30);
        assert_eq!(calculate_points(7.0, "karaoke"), 7);
    }

    #[test]
    fn test_raw_points_keep_fractions() {
        assert!((raw_points(10.0, "reading_time") - 6.7).abs() < 1e-9);
        assert_eq!(raw_points(7.0, "karaoke"), 0.0);
    }

    #[test]
    fn test_total_points_over_stats() {
        let mut stats = BTreeMap::new();
        stats.insert("anime".to_string(), MediaStats { total: 3.0, ..Default::default() });
        stats.insert("book".to_string(), MediaStats { total: 20.0, ..Default::default() });
        assert_eq!(total_points(&stats), 59);
    }
}
