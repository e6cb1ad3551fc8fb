use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// "1 player", "3 players".
pub fn players(count: usize) -> String {
    match count {
        1 => "1 player".to_string(),
        n => format!("{n} players"),
    }
}

/// Channel topic for a queue length.
pub fn topic_text(queue_length: usize) -> String {
    match queue_length {
        0 => "Dead game...".to_string(),
        n => format!("{} in queue", players(n)),
    }
}

/// Rough wait indicator shown after joining.
pub fn wait_estimate(position: usize) -> &'static str {
    match position {
        0 | 1 => "🟢 You're next",
        2 | 3 => "🟡 Soon",
        _ => "🔴 A while",
    }
}

/// Format how long someone has waited, e.g. "2h 5m", "12m", "40s".
pub fn format_waited(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - since).num_seconds().max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_topic_text() {
        assert_eq!(topic_text(0), "Dead game...");
        assert_eq!(topic_text(1), "1 player in queue");
        assert_eq!(topic_text(7), "7 players in queue");
    }

    #[test]
    fn test_players() {
        assert_eq!(players(0), "0 players");
        assert_eq!(players(1), "1 player");
        assert_eq!(players(2), "2 players");
    }

    #[test]
    fn test_wait_estimate_thresholds() {
        assert_eq!(wait_estimate(1), "🟢 You're next");
        assert_eq!(wait_estimate(3), "🟡 Soon");
        assert_eq!(wait_estimate(4), "🔴 A while");
    }

    #[test]
    fn test_format_waited() {
        let base = Utc.timestamp_opt(1700000000, 0).unwrap();
        let at = |secs: i64| Utc.timestamp_opt(1700000000 + secs, 0).unwrap();
        assert_eq!(format_waited(base, at(40)), "40s");
        assert_eq!(format_waited(base, at(12 * 60 + 5)), "12m");
        assert_eq!(format_waited(base, at(2 * 3600 + 5 * 60)), "2h 5m");
        // Clock skew never shows a negative wait
        assert_eq!(format_waited(at(10), base), "0s");
    }
}
