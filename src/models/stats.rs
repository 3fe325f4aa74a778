// Leaderboard rows and ranking

use std::cmp::Ordering;

use super::media::MediaType;

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    /// Unrounded weighted points
    pub points: f64,
    /// Raw amount; only meaningful when filtered to one media type
    pub amount: f64,
}

/// Running tally for one user while scanning logs or stats
#[derive(Debug, Clone, Default)]
pub struct Tally {
    pub points: f64,
    pub amount: f64,
}

impl Tally {
    pub fn add(&mut self, type_key: &str, amount: f64) {
        self.points += crate::utils::points::raw_points(amount, type_key);
        self.amount += amount;
    }
}

/// Sorts best first and drops users with nothing to show
pub fn rank_entries(mut entries: Vec<LeaderboardEntry>, media: Option<MediaType>) -> Vec<LeaderboardEntry> {
    let score = |e: &LeaderboardEntry| if media.is_some() { e.amount } else { e.points };
    entries.retain(|e| score(e) > 0.0);
    entries.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    entries
}

/// Medal or `n.` prefix for a 1-based rank
pub fn rank_prefix(rank: usize) -> String {
    match rank {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("`{n}.`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, points: f64, amount: f64) -> LeaderboardEntry {
        LeaderboardEntry {
            user_id: name.to_string(),
            display_name: name.to_string(),
            points,
            amount,
        }
    }

    #[test]
    fn test_rank_by_points_overall() {
        let ranked = rank_entries(
            vec![entry("a", 10.0, 1.0), entry("b", 30.5, 1.0), entry("c", 0.0, 5.0)],
            None,
        );
        let names: Vec<_> = ranked.iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_rank_by_amount_for_single_type() {
        let ranked = rank_entries(
            vec![entry("a", 100.0, 2.0), entry("b", 1.0, 9.0)],
            Some(MediaType::Manga),
        );
        assert_eq!(ranked[0].display_name, "b");
    }

    #[test]
    fn test_ties_break_by_name() {
        let ranked = rank_entries(vec![entry("zed", 5.0, 0.0), entry("amy", 5.0, 0.0)], None);
        assert_eq!(ranked[0].display_name, "amy");
    }

    #[test]
    fn test_tally_ignores_unknown_types_for_points() {
        let mut tally = Tally::default();
        tally.add("anime", 2.0);
        tally.add("karaoke", 3.0);
        assert_eq!(tally.points, 26.0);
        assert_eq!(tally.amount, 5.0);
        assert_eq!(rank_prefix(2), "🥈");
        assert_eq!(rank_prefix(7), "`7.`");
    }
}
