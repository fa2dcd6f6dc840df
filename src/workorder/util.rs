use anyhow::Result;
use chrono::{DateTime, Local};
use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

/// Date format used for the `data` field of a ticket.
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

pub fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

pub fn display_date(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format(DISPLAY_DATE_FORMAT)
        .to_string()
}

/// Creation time where the platform records it, otherwise modification time.
pub fn created_or_modified(meta: &Metadata) -> SystemTime {
    meta.created()
        .or_else(|_| meta.modified())
        .unwrap_or(UNIX_EPOCH)
}

pub fn modified(meta: &Metadata) -> SystemTime {
    meta.modified().unwrap_or(UNIX_EPOCH)
}

/// Truncate `input` to at most `max_chars` Unicode characters.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("Conceição", 6), "Concei");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(collapse_whitespace("  Maria \t\n Silva  "), "Maria Silva");
    }

    #[test]
    fn display_date_uses_day_month_year() {
        let t = UNIX_EPOCH + Duration::from_secs(86_400 * 400);
        let shown = display_date(t);
        assert_eq!(shown.len(), 10);
        assert_eq!(&shown[2..3], "/");
        assert_eq!(&shown[5..6], "/");
        assert!(shown.ends_with("1971"));
    }
}
