//! Formatting utilities for CLI output.

use hoplite_core::StopReason;

/// Truncate a string to at most `max_len` characters, ending in `...`.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return ".".repeat(max_len);
    }
    let head: String = s.chars().take(max_len - 3).collect();
    format!("{}...", head)
}

/// Collapse whitespace so chunk text fits on one table row.
pub fn preview(text: &str, max_len: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_str(&flat, max_len)
}

/// Milliseconds as `850 ms` or `1.4 s`.
pub fn format_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{} ms", ms)
    } else {
        format!("{:.1} s", ms as f64 / 1000.0)
    }
}

/// Human label for a stop reason.
pub fn stop_reason(reason: StopReason) -> &'static str {
    match reason {
        StopReason::MultiHopDisabled => "multi-hop disabled",
        StopReason::HopBudgetExhausted => "hop budget exhausted",
        StopReason::Sufficient => "judge found context sufficient",
        StopReason::NoFollowUp => "judge proposed no follow-up",
        StopReason::JudgeFailed => "judge failed (treated as sufficient)",
        StopReason::EmptyHop => "follow-up hop found nothing",
        StopReason::BackendFailed => "follow-up retrieval failed",
        StopReason::RepeatedQuery => "judge repeated a query",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hello", 3), "...");
        assert_eq!(truncate_str("überwachung", 6), "übe...");
    }

    #[test]
    fn test_preview_flattens_lines() {
        assert_eq!(preview("Dash:\n  a model\tmoves", 40), "Dash: a model moves");
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(0), "0 ms");
        assert_eq!(format_ms(999), "999 ms");
        assert_eq!(format_ms(2500), "2.5 s");
    }
}
