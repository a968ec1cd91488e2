//! Summary response parsing.
//!
//! The model is asked for a `SUMMARY:` section followed by `KEY POINTS:`;
//! this parser is tolerant of deviation and degrades to treating the whole
//! response as the summary rather than failing.

use std::sync::LazyLock;

use regex::Regex;

/// Parsed summary output.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSummary {
    pub summary: String,
    pub key_points: Vec<String>,
}

static SUMMARY_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)summary:").unwrap());

static KEY_POINTS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)key points:").unwrap());

static KEY_POINT: LazyLock<Regex> = LazyLock::new(|| {
    // Enumerated ("1." / "1)"), dashed, or bulleted lines count as points.
    Regex::new(r"^\s*(?:\d+[.)]|-|•)\s*(.+)$").unwrap()
});

const MAX_KEY_POINTS: usize = 5;

/// Splits a model response into summary text and up to five key points.
///
/// Both section markers are matched case-insensitively, directly on the
/// response so every offset is a valid index into it. When the markers are
/// missing the whole response becomes the summary and the key point list is
/// empty; this function never fails.
pub fn parse_summary(response: &str) -> ParsedSummary {
    let Some(summary_marker) = SUMMARY_MARKER.find(response) else {
        return ParsedSummary {
            summary: response.trim().to_string(),
            key_points: Vec::new(),
        };
    };
    let rest = &response[summary_marker.end()..];

    match KEY_POINTS_MARKER.find(rest) {
        Some(points_marker) => ParsedSummary {
            summary: rest[..points_marker.start()].trim().to_string(),
            key_points: extract_points(&rest[points_marker.end()..]),
        },
        None => ParsedSummary {
            summary: rest.trim().to_string(),
            key_points: Vec::new(),
        },
    }
}

fn extract_points(section: &str) -> Vec<String> {
    section
        .lines()
        .filter_map(|line| {
            KEY_POINT
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|point| !point.is_empty())
        .take(MAX_KEY_POINTS)
        .collect()
}
