//! Entry text normalization.
//!
//! Reduces one raw prescription entry ("ANS AMLODIPIN 10 MG TABLET#30",
//! a multi-line racikan block, "R/ Amoxan 500mg caps") to a bare uppercase
//! candidate name for resolution. Entries that reduce to the empty string
//! carry no drug and are dropped by the caller.

use std::sync::LazyLock;

use regex::Regex;

/// First structural delimiter: everything from here on is quantity, form or
/// compounding instructions. Dosage-form words match whole-word only so that
/// names like CAPTOPRIL or TABLOID-free brands survive.
static RE_DELIMITER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"#|:|\bM\.\s*F\b|\bNO\.|\b(?:DTD|PULV|PULVIS|TAB|TABS|TABLET|TABLETS|CAP|CAPS|CAPSUL|CAPSULE|CAPSULES|KAPSUL|KAPLET|CAPLET|SYR|SYRUP|SIRUP|BTL|FLS|INJ|INJEKSI|AMP|AMPUL|VIAL|SUPP|SALEP|CREAM|KRIM|TETES|DROP|DROPS|SACHET|SUSP|SUSPENSI|ELIXIR|GEL|LOTION|OINTMENT)\b",
    )
    .unwrap()
});

/// "3 DD 1", "3X1", "2x".
static RE_FREQUENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+\s*(?:DD|X)\s*(?:\d+(?:[.,/]\d+)?)?\b").unwrap()
});

/// Numeric dosage tokens with an optional attached unit: "10 MG", "100MG",
/// "0,5ML", "1/2", "1-0-1", "5%".
static RE_DOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+(?:[.,/\-]\d+)*\s*(?:(?:MCG|MG|ML|IU|GR|G|L|CC)\b|%)?").unwrap()
});

static RE_UNIT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:MG|MCG|ML|IU|GRAM|GR|MILIGRAM|MILLIGRAM|MILILITER|MILLILITER)\b").unwrap()
});

/// Site-specific tokens that wrap the drug name. Time-of-day words are read
/// by the schedule parser from the raw entry.
const NOISE_TOKENS: &[&str] = &[
    "ANS", "R", "RACIKAN", "PRN", "PAGI", "SIANG", "SORE", "MALAM", "MORNING", "NOON", "NIGHT",
];

/// Normalize a raw entry into an uppercase candidate name.
///
/// Returns an empty string when no alphabetic content remains.
pub fn normalize_entry(raw: &str) -> String {
    let upper = raw.to_uppercase();

    let first_line = upper.lines().find(|l| !l.trim().is_empty()).unwrap_or("");

    let truncated = match RE_DELIMITER.find(first_line) {
        Some(m) => &first_line[..m.start()],
        None => first_line,
    };

    let without_freq = RE_FREQUENCY.replace_all(truncated, " ");
    let without_dose = RE_DOSE.replace_all(&without_freq, " ");
    let without_units = RE_UNIT_WORD.replace_all(&without_dose, " ");

    let cleaned: String = without_units
        .chars()
        .map(|c| {
            if c.is_alphabetic() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let tokens: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphabetic))
        .collect();

    strip_noise(&tokens).join(" ")
}

/// Drop noise tokens from both ends of the token list.
fn strip_noise<'a>(tokens: &'a [&'a str]) -> &'a [&'a str] {
    let start = tokens
        .iter()
        .position(|t| !NOISE_TOKENS.contains(t))
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| !NOISE_TOKENS.contains(t))
        .map_or(start, |i| i + 1);
    &tokens[start..end.max(start)]
}
