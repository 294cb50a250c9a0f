//! Field normalizers
//!
//! Pure functions that turn loosely formatted spreadsheet values into the
//! canonical forms the bulk-create endpoints expect. None of them fail: a
//! value that cannot be normalized becomes an empty string and is dropped
//! from the outgoing payload.

use regex::Regex;
use std::sync::LazyLock;

/// Full state / district names and their USPS codes
const STATE_CODES: &[(&str, &str)] = &[
    ("alabama", "AL"),
    ("alaska", "AK"),
    ("arizona", "AZ"),
    ("arkansas", "AR"),
    ("california", "CA"),
    ("colorado", "CO"),
    ("connecticut", "CT"),
    ("delaware", "DE"),
    ("district of columbia", "DC"),
    ("florida", "FL"),
    ("georgia", "GA"),
    ("hawaii", "HI"),
    ("idaho", "ID"),
    ("illinois", "IL"),
    ("indiana", "IN"),
    ("iowa", "IA"),
    ("kansas", "KS"),
    ("kentucky", "KY"),
    ("louisiana", "LA"),
    ("maine", "ME"),
    ("maryland", "MD"),
    ("massachusetts", "MA"),
    ("michigan", "MI"),
    ("minnesota", "MN"),
    ("mississippi", "MS"),
    ("missouri", "MO"),
    ("montana", "MT"),
    ("nebraska", "NE"),
    ("nevada", "NV"),
    ("new hampshire", "NH"),
    ("new jersey", "NJ"),
    ("new mexico", "NM"),
    ("new york", "NY"),
    ("north carolina", "NC"),
    ("north dakota", "ND"),
    ("ohio", "OH"),
    ("oklahoma", "OK"),
    ("oregon", "OR"),
    ("pennsylvania", "PA"),
    ("rhode island", "RI"),
    ("south carolina", "SC"),
    ("south dakota", "SD"),
    ("tennessee", "TN"),
    ("texas", "TX"),
    ("utah", "UT"),
    ("vermont", "VT"),
    ("virginia", "VA"),
    ("washington", "WA"),
    ("west virginia", "WV"),
    ("wisconsin", "WI"),
    ("wyoming", "WY"),
];

#[allow(clippy::unwrap_used)]
static HTTP_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://\S+$").unwrap());

/// Normalize a US state to its two-letter code.
///
/// Two-letter input of any case is upper-cased as-is; full names (any case,
/// surrounding/internal whitespace tolerated) are looked up. Anything else
/// yields an empty string.
pub fn normalize_state(value: &str) -> String {
    let value = value.trim();
    if value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic()) {
        return value.to_ascii_uppercase();
    }

    let name = value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    STATE_CODES
        .iter()
        .find(|(full, _)| *full == name)
        .map(|(_, code)| code.to_string())
        .unwrap_or_default()
}

/// Normalize a phone number to `+<digits>`.
///
/// Ten digits are treated as a US number and get the `+1` country code,
/// eleven digits starting with `1` are already qualified, and any other
/// digit count is passed through behind a bare `+`.
pub fn normalize_phone(value: &str) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        0 => String::new(),
        10 => format!("+1{}", digits),
        _ => format!("+{}", digits),
    }
}

/// Normalize a ZIP code to `DDDDD` or `DDDDD-DDDD`.
pub fn normalize_postal_code(value: &str) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        5 => digits,
        9 => format!("{}-{}", &digits[..5], &digits[5..]),
        _ => String::new(),
    }
}

/// Keep `value` only when it looks like an absolute http(s) URL.
pub fn normalize_image_url(value: &str) -> String {
    let value = value.trim();
    if HTTP_URL.is_match(value) {
        value.to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes_and_names() {
        assert_eq!(normalize_state("Texas"), "TX");
        assert_eq!(normalize_state("tx"), "TX");
        assert_eq!(normalize_state("  new   york "), "NY");
        assert_eq!(normalize_state("District of Columbia"), "DC");
        assert_eq!(normalize_state("Unknown"), "");
        assert_eq!(normalize_state(""), "");
        assert_eq!(normalize_state("T1"), "");
    }

    #[test]
    fn test_state_table_is_complete() {
        assert_eq!(STATE_CODES.len(), 51);
    }

    #[test]
    fn test_phone() {
        assert_eq!(normalize_phone("(512) 555-0199"), "+15125550199");
        assert_eq!(normalize_phone("1-512-555-0199"), "+15125550199");
        assert_eq!(normalize_phone("+44 20 7946 0958"), "+442079460958");
        assert_eq!(normalize_phone("ext."), "");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_postal_code() {
        assert_eq!(normalize_postal_code("78701"), "78701");
        assert_eq!(normalize_postal_code("78701-1234"), "78701-1234");
        assert_eq!(normalize_postal_code("787011234"), "78701-1234");
        assert_eq!(normalize_postal_code("7870"), "");
        assert_eq!(normalize_postal_code("n/a"), "");
    }

    #[test]
    fn test_image_url() {
        assert_eq!(
            normalize_image_url(" https://images.example.com/a.png "),
            "https://images.example.com/a.png"
        );
        assert_eq!(normalize_image_url("HTTP://cdn.example.com/x.jpg"), "HTTP://cdn.example.com/x.jpg");
        assert_eq!(normalize_image_url("ftp://example.com/a.png"), "");
        assert_eq!(normalize_image_url("images/a.png"), "");
        assert_eq!(normalize_image_url("https://"), "");
    }
}
