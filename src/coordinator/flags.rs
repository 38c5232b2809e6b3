// src/coordinator/flags.rs
//! Location to flag glyph
//!
//! [`resolve_flag`] is total and deterministic:
//!
//! 1. normalize (trim, lowercase, punctuation runs to one space)
//! 2. region table, substring containment
//! 3. country table (names and aliases to ISO codes), substring containment
//! 4. a bare two-uppercase-letter token in the raw string
//! 5. the default glyph
//!
//! Both tables are ordered longest key first, so the first hit in a table is
//! the longest one. A country key that spans the region hit ("malaysia" over
//! "asia", "south africa" over "africa") wins over the region.

use once_cell::sync::Lazy;
use regex::Regex;

/// Returned when nothing matches
pub const DEFAULT_FLAG: &str = "🏳️";

/// Distance from 'A' to REGIONAL INDICATOR SYMBOL LETTER A
const REGIONAL_INDICATOR_OFFSET: u32 = 127397;

static REGIONS: &[(&str, &str)] = &[
    ("central america", "🌎"),
    ("north america", "🌎"),
    ("south america", "🌎"),
    ("latin america", "🌎"),
    ("middle east", "🌍"),
    ("worldwide", "🌐"),
    ("americas", "🌎"),
    ("oceania", "🌏"),
    ("europe", "🇪🇺"),
    ("africa", "🌍"),
    ("global", "🌐"),
    ("earth", "🌐"),
    ("asia", "🌏"),
];

static COUNTRIES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    let mut table = vec![
        ("united states of america", "US"),
        ("united states", "US"),
        ("usa", "US"),
        ("united kingdom", "GB"),
        ("great britain", "GB"),
        ("britain", "GB"),
        ("england", "GB"),
        ("scotland", "GB"),
        ("wales", "GB"),
        ("uk", "GB"),
        ("canada", "CA"),
        ("mexico", "MX"),
        ("brazil", "BR"),
        ("brasil", "BR"),
        ("argentina", "AR"),
        ("chile", "CL"),
        ("colombia", "CO"),
        ("peru", "PE"),
        ("venezuela", "VE"),
        ("germany", "DE"),
        ("deutschland", "DE"),
        ("france", "FR"),
        ("spain", "ES"),
        ("espana", "ES"),
        ("portugal", "PT"),
        ("italy", "IT"),
        ("italia", "IT"),
        ("netherlands", "NL"),
        ("the netherlands", "NL"),
        ("holland", "NL"),
        ("belgium", "BE"),
        ("switzerland", "CH"),
        ("austria", "AT"),
        ("ireland", "IE"),
        ("sweden", "SE"),
        ("norway", "NO"),
        ("denmark", "DK"),
        ("finland", "FI"),
        ("iceland", "IS"),
        ("poland", "PL"),
        ("czech republic", "CZ"),
        ("czechia", "CZ"),
        ("hungary", "HU"),
        ("romania", "RO"),
        ("greece", "GR"),
        ("turkey", "TR"),
        ("turkiye", "TR"),
        ("ukraine", "UA"),
        ("russia", "RU"),
        ("israel", "IL"),
        ("saudi arabia", "SA"),
        ("united arab emirates", "AE"),
        ("uae", "AE"),
        ("egypt", "EG"),
        ("morocco", "MA"),
        ("nigeria", "NG"),
        ("kenya", "KE"),
        ("ghana", "GH"),
        ("ethiopia", "ET"),
        ("south africa", "ZA"),
        ("india", "IN"),
        ("pakistan", "PK"),
        ("bangladesh", "BD"),
        ("sri lanka", "LK"),
        ("nepal", "NP"),
        ("china", "CN"),
        ("hong kong", "HK"),
        ("taiwan", "TW"),
        ("japan", "JP"),
        ("south korea", "KR"),
        ("korea", "KR"),
        ("vietnam", "VN"),
        ("thailand", "TH"),
        ("malaysia", "MY"),
        ("singapore", "SG"),
        ("indonesia", "ID"),
        ("philippines", "PH"),
        ("australia", "AU"),
        ("new zealand", "NZ"),
    ];
    // Stable sort keeps declaration order among equal lengths
    table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    table
});

static BARE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z]{2})\b").expect("bare code pattern is valid"));

/// Resolve a location string to a flag glyph
pub fn resolve_flag(location: Option<&str>) -> String {
    let Some(raw) = location else {
        return DEFAULT_FLAG.to_string();
    };
    let normalized = normalize_location(raw);
    if normalized.is_empty() {
        return DEFAULT_FLAG.to_string();
    }

    if let Some((region, glyph)) = REGIONS.iter().find(|(name, _)| normalized.contains(name)) {
        // A longer country key covering the region hit is the more specific one
        let covering = COUNTRIES
            .iter()
            .find(|(name, _)| name.contains(region) && normalized.contains(name));
        return match covering {
            Some((_, code)) => code_to_flag(code).unwrap_or_else(|| DEFAULT_FLAG.to_string()),
            None => glyph.to_string(),
        };
    }

    if let Some(flag) = COUNTRIES
        .iter()
        .find(|(name, _)| normalized.contains(name))
        .and_then(|(_, code)| code_to_flag(code))
    {
        return flag;
    }

    BARE_CODE
        .captures(raw.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|code| code_to_flag(code.as_str()))
        .unwrap_or_else(|| DEFAULT_FLAG.to_string())
}

/// Two ASCII uppercase letters to a pair of regional indicator symbols
pub fn code_to_flag(code: &str) -> Option<String> {
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    code.chars()
        .map(|c| char::from_u32(c as u32 + REGIONAL_INDICATOR_OFFSET))
        .collect()
}

/// Lowercased, with every non-alphanumeric run collapsed to one space
fn normalize_location(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
