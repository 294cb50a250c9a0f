//! Header canonicalization and duplicate-column handling
//!
//! Spreadsheets exported from different tools spell the same column in many
//! ways ("Zip Code", "zip_code", "ZIPCODE"), and some carry the same column
//! twice. Headers are mapped onto a fixed vocabulary once per import, repeats
//! get a `__dup{n}` suffix, and [`collapse_duplicates`] later folds the
//! repeated values back into the canonical field of each row.

use std::collections::HashMap;

use crate::record::RawRecord;

/// Separator between a canonical key and its occurrence number
pub const DUPLICATE_MARKER: &str = "__dup";

/// Fields whose values are lists, merged rather than dropped when repeated
pub const MULTI_VALUED_FIELDS: &[&str] = &["practice areas", "language"];

const IMAGE_URL_ALIASES: &[&str] = &[
    "imageurl",
    "image",
    "image link",
    "image links",
    "imagelink",
    "image address",
    "logo",
    "logo url",
    "logourl",
    "photo",
    "photo url",
    "photourl",
    "picture",
    "picture url",
];

/// Map one raw header onto the canonical vocabulary.
///
/// Trims, lower-cases, collapses whitespace/underscore/hyphen runs into a
/// single space, then applies the alias table. Unknown headers pass through
/// in their normalized spelling. Canonical keys are fixed points.
pub fn canonical_key(raw: &str) -> String {
    let lowered = raw.trim_start_matches('\u{feff}').trim().to_lowercase();
    let normalized = lowered
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let alias = match normalized.as_str() {
        "zipcode" | "zip code" | "postal code" | "postcode" => Some("zip"),
        "street" | "streetaddress" => Some("street address"),
        "licence" => Some("license"),
        other if IMAGE_URL_ALIASES.contains(&other) => Some("image url"),
        _ => None,
    };

    match alias {
        Some(canonical) => canonical.to_string(),
        None => normalized,
    }
}

/// Per-import header canonicalizer.
///
/// Holds the table of keys already seen in the header row so repeated
/// columns are disambiguated deterministically. One instance belongs to one
/// import job; [`HeaderCanonicalizer::reset`] clears it.
#[derive(Debug, Default)]
pub struct HeaderCanonicalizer {
    seen: HashMap<String, usize>,
}

impl HeaderCanonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalize one header, suffixing repeats as `key__dup2`, `key__dup3`, ...
    pub fn canonicalize(&mut self, raw: &str) -> String {
        let key = canonical_key(raw);
        let count = self.seen.entry(key.clone()).or_insert(0);
        *count += 1;

        if *count == 1 {
            key
        } else {
            format!("{}{}{}", key, DUPLICATE_MARKER, count)
        }
    }

    /// Canonicalize a whole header row in column order
    pub fn canonicalize_row<I, S>(&mut self, headers: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        headers
            .into_iter()
            .map(|header| self.canonicalize(header.as_ref()))
            .collect()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

/// Split `key__dupN` into `(key, N)`
fn split_duplicate(key: &str) -> Option<(&str, usize)> {
    let (base, n) = key.rsplit_once(DUPLICATE_MARKER)?;
    if base.is_empty() || n.is_empty() || !n.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    n.parse().ok().map(|n| (base, n))
}

/// Fold `base__dupN` columns back into `base`.
///
/// An empty base takes the duplicate's value; a multi-valued base appends it
/// with `"; "`; otherwise the duplicate is discarded. Duplicates are applied
/// in ascending `N`, and none of them survive in the output.
pub fn collapse_duplicates(mut record: RawRecord) -> RawRecord {
    let mut duplicates: Vec<(String, usize, String)> = record
        .keys()
        .filter_map(|key| split_duplicate(key).map(|(base, n)| (key.to_string(), n, base.to_string())))
        .collect();

    if duplicates.is_empty() {
        return record;
    }
    duplicates.sort_by(|a, b| a.2.cmp(&b.2).then(a.1.cmp(&b.1)));

    for (key, _, base) in duplicates {
        let Some(value) = record.remove(&key) else {
            continue;
        };
        if value.trim().is_empty() {
            continue;
        }

        let current = record.get(&base).map(str::trim).unwrap_or_default();
        if current.is_empty() {
            record.insert(base, value);
        } else if MULTI_VALUED_FIELDS.contains(&base.as_str()) {
            let merged = format!("{}; {}", current, value.trim());
            record.insert(base, merged);
        }
    }

    record
}
