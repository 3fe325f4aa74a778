// Text formatting helpers for embeds and exports

use chrono::{DateTime, Duration, Utc};

use super::config::jst;

/// Discord's 2000 char limit minus room for a prefix
pub const MESSAGE_CHUNK_LIMIT: usize = 1950;

/// Thousands separators; fractional values keep up to two decimals
pub fn format_number(value: f64) -> String {
    let negative = value < 0.0;
    let rounded = (value.abs() * 100.0).round() / 100.0;
    let whole = rounded.trunc() as u64;
    let fraction = ((rounded - rounded.trunc()) * 100.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = if negative { format!("-{grouped}") } else { grouped };
    if fraction > 0 {
        let frac = format!("{fraction:02}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

/// Compact points for tight spaces: "850", "1.2K", "3.4M"
pub fn format_points_short(points: f64) -> String {
    let abs = points.abs();
    // Cut at the rounding edge: 999,960 reads "1.0M", not "1000.0K"
    if abs >= 999_950.0 {
        format!("{:.1}M", points / 1_000_000.0)
    } else if abs >= 999.5 {
        format!("{:.1}K", points / 1_000.0)
    } else {
        format!("{}", points.round() as i64)
    }
}

pub fn format_amount(amount: f64, unit: &str) -> String {
    format!("{} {}", format_number(amount), unit)
}

/// Char-aware truncation with a trailing "..."
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

pub fn plural_days(n: u32) -> String {
    format!("{} day{}", n, if n == 1 { "" } else { "s" })
}

/// "Today, 14:05" / "Yesterday, 09:30" / "Monday, 3 Mar, 22:10" in JST
pub fn format_log_time(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let tz = jst();
    let local = created.with_timezone(&tz);
    let today = now.with_timezone(&tz).date_naive();

    let day = local.date_naive();
    let time = local.format("%H:%M");
    if day == today {
        format!("Today, {time}")
    } else if day == today - Duration::days(1) {
        format!("Yesterday, {time}")
    } else {
        format!("{}, {time}", local.format("%A, %-d %b"))
    }
}

/// "Monday, 3 Mar 2025 at 22:10" in JST
pub fn format_export_time(created: DateTime<Utc>) -> String {
    created
        .with_timezone(&jst())
        .format("%A, %-d %b %Y at %H:%M")
        .to_string()
}

/// Human duration for AFK notices, e.g. "2h 5m"
pub fn format_elapsed(elapsed: Duration) -> String {
    let minutes = elapsed.num_minutes().max(0);
    match minutes {
        0 => "less than a minute".to_string(),
        m if m < 60 => format!("{m}m"),
        m if m < 60 * 24 => match m % 60 {
            0 => format!("{}h", m / 60),
            rest => format!("{}h {}m", m / 60, rest),
        },
        m => format!("{}d {}h", m / (60 * 24), (m / 60) % 24),
    }
}

/// Split a reply into Discord-sized chunks, preferring line then word breaks
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > limit {
        let hard_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..hard_end];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(hard_end);

        chunks.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(1234567.0), "1,234,567");
        assert_eq!(format_number(1500.5), "1,500.5");
        assert_eq!(format_number(-2500.0), "-2,500");
        assert_eq!(format_number(12.346), "12.35");
    }

    #[test]
    fn test_format_points_short() {
        assert_eq!(format_points_short(0.0), "0");
        assert_eq!(format_points_short(849.6), "850");
        assert_eq!(format_points_short(1_234.0), "1.2K");
        assert_eq!(format_points_short(999_960.0), "1.0M");
        assert_eq!(format_points_short(3_400_000.0), "3.4M");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ようこそ実力至上主義の教室へ", 8), "ようこそ実...");
    }

    #[test]
    fn test_log_time_labels() {
        let now = Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).unwrap(); // 21:00 JST Wed
        let today = Utc.with_ymd_and_hms(2025, 3, 5, 1, 30, 0).unwrap();
        let yesterday = Utc.with_ymd_and_hms(2025, 3, 4, 5, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2025, 3, 2, 13, 10, 0).unwrap();

        assert_eq!(format_log_time(today, now), "Today, 10:30");
        assert_eq!(format_log_time(yesterday, now), "Yesterday, 14:00");
        assert_eq!(format_log_time(older, now), "Sunday, 2 Mar, 22:10");
    }

    #[test]
    fn test_elapsed() {
        assert_eq!(format_elapsed(Duration::seconds(30)), "less than a minute");
        assert_eq!(format_elapsed(Duration::minutes(125)), "2h 5m");
        assert_eq!(format_elapsed(Duration::hours(26)), "1d 2h");
    }

    #[test]
    fn test_chunk_message_prefers_newlines() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = chunk_message(&text, 40);
        assert_eq!(chunks, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn test_chunk_message_hard_split() {
        let text = "x".repeat(95);
        let chunks = chunk_message(&text, 40);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
    }
}
