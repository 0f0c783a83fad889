//! Common utility functions used across Concierge components

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC instant as an ISO 8601 / RFC 3339 timestamp
pub fn to_iso8601(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current UTC time as an ISO 8601 timestamp
pub fn now_iso8601() -> String {
    to_iso8601(&Utc::now())
}

/// Truncate string to at most `max_chars` characters, adding an ellipsis
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else if max_chars <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", kept)
    }
}

/// Parse a boolean-like setting ("1", "true", "yes", "on", ...)
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso8601_round_trips_through_chrono() {
        let formatted = now_iso8601();
        assert!(formatted.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&formatted).is_ok());
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("hi", 2), "hi");
        assert_eq!(truncate_string("hi there", 1), "...");
        // multi-byte characters are never split
        assert_eq!(truncate_string("héllo wörld", 7), "héll...");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Ok(true));
        assert_eq!(parse_bool(" YES "), Ok(true));
        assert_eq!(parse_bool("1"), Ok(true));
        assert_eq!(parse_bool("off"), Ok(false));
        assert_eq!(parse_bool("n"), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }
}
