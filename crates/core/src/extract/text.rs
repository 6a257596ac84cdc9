//! Cell text helpers.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use scraper::ElementRef;

static SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([\d.,]+)\s*([KMGT]?B)\b").expect("size pattern is valid")
});

/// Concatenated, trimmed text content of an element.
pub fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse the leading token of a track-number cell ("1.", "12") into a number.
///
/// Punctuation inside the token is dropped; a token without digits yields `None`.
pub fn parse_track_number(text: &str) -> Option<u32> {
    let token = text.split_whitespace().next()?;
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Parse a human size such as "3.2 MB" into bytes using binary multiples.
pub fn parse_size_bytes(text: &str) -> Option<u64> {
    let caps = SIZE.captures(text)?;
    let value: f64 = caps[1].replace(',', "").parse().ok()?;
    let multiplier: u64 = match caps[2].to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        _ => return None,
    };
    Some((value * multiplier as f64).round() as u64)
}
