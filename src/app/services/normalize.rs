//! Value normalization for extracted roster cells
//!
//! Cleans the recurring artifacts of the scanned sources: dollar amounts
//! split across whitespace by the recognizer, stray text around monetary
//! values, the "p.m." postmaster-fee notation, and abbreviated or mangled
//! state names under section headings.

use regex::Regex;
use std::sync::LazyLock;

/// Dollar amount whose digit groups were split by internal whitespace
static SPLIT_CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s?([\d,]*\d,?)\s+(\d)").expect("valid split-currency regex"));

/// First monetary-looking token in a compensation cell
static MONEY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?[\d,.]*\d").expect("valid money-token regex"));

/// Postmaster-fee notation, with or without the internal space
static PM_NOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)p\.\s?m\.").expect("valid p.m. regex"));

/// Rejoin digit groups split by whitespace inside monetary tokens
///
/// The recognizer and the generation service both occasionally print a
/// dollar amount as two groups ("$1 500", "$1, 500"). This must run before
/// any delimiter splitting: once a split amount crosses a field boundary
/// the field counts are unrecoverable. Rejoined tokens drop their grouping
/// commas ("$1500") so the result cannot itself split a comma-delimited row.
pub fn rejoin_split_currency(text: &str) -> String {
    let mut current = text.to_string();
    // Amounts can be split more than once ("$1 234 567"); iterate to a fixed
    // point, each pass joining one gap per token.
    loop {
        let next = SPLIT_CURRENCY
            .replace_all(&current, |caps: &regex::Captures| {
                format!("${}{}", caps[1].replace(',', ""), &caps[2])
            })
            .to_string();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Whether a compensation value carries the postmaster-fee notation
pub fn has_postmaster_notation(value: &str) -> bool {
    PM_NOTATION.is_match(value)
}

/// Clean and normalize a compensation value
///
/// Extracts the monetary token, drops thousands commas, guarantees the `$`
/// prefix, and re-appends the `p.m.` notation when present. Values with no
/// recognizable monetary token pass through unchanged so the validator can
/// surface them.
pub fn clean_compensation(value: &str) -> String {
    // Fragments carry split amounts too ("$1 200"); rejoin before extracting
    // the token or the group after the space is lost.
    let rejoined = rejoin_split_currency(value.trim());
    let trimmed = rejoined.as_str();
    if trimmed.is_empty() {
        return String::new();
    }

    let is_pm = has_postmaster_notation(trimmed);
    let stripped = PM_NOTATION.replace_all(trimmed, "");

    let Some(token) = MONEY_TOKEN.find(&stripped) else {
        return trimmed.to_string();
    };

    let mut clean = token.as_str().replace(',', "");
    if !clean.starts_with('$') {
        clean.insert(0, '$');
    }

    if is_pm {
        format!("{} p.m.", clean)
    } else {
        clean
    }
}

/// Valid region names beyond the section-heading keyword list
const EXTRA_VALID_STATES: &[&str] = &[
    "Alaska",
    "District of Columbia",
    "North Dakota",
    "South Dakota",
    "Oklahoma",
];

/// Abbreviation and common-misreading table for state names.
///
/// Matched by prefix against the period-stripped heading text, so "N. Y" and
/// "N.Y." both resolve. Order matters where one entry prefixes another.
const STATE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Ala", "Alabama"),
    ("Ariz", "Arizona"),
    ("Ark", "Arkansas"),
    ("Calif", "California"),
    ("Cal", "California"),
    ("Colo", "Colorado"),
    ("Col", "Colorado"),
    ("Conn", "Connecticut"),
    ("Dak", "Dakota"),
    ("Del", "Delaware"),
    ("Fla", "Florida"),
    ("Ga", "Georgia"),
    ("Ill", "Illinois"),
    ("Ind", "Indiana"),
    ("Kan", "Kansas"),
    ("Ky", "Kentucky"),
    ("La", "Louisiana"),
    ("Md", "Maryland"),
    ("Mass", "Massachusetts"),
    ("Mich", "Michigan"),
    ("Minn", "Minnesota"),
    ("Miss", "Mississippi"),
    ("Mont", "Montana"),
    ("Mo", "Missouri"),
    ("Neb", "Nebraska"),
    ("Nev", "Nevada"),
    ("N.H", "New Hampshire"),
    ("N. H", "New Hampshire"),
    ("N.J", "New Jersey"),
    ("N. J", "New Jersey"),
    ("N.M", "New Mexico"),
    ("N. M", "New Mexico"),
    ("N.Y", "New York"),
    ("N. Y", "New York"),
    ("N.C", "North Carolina"),
    ("N. C", "North Carolina"),
    ("N.D", "North Dakota"),
    ("N. D", "North Dakota"),
    ("Okla", "Oklahoma"),
    ("Ore", "Oregon"),
    ("Penn", "Pennsylvania"),
    ("Pa", "Pennsylvania"),
    ("R.I", "Rhode Island"),
    ("R. I", "Rhode Island"),
    ("S.C", "South Carolina"),
    ("S. C", "South Carolina"),
    ("S.D", "South Dakota"),
    ("S. D", "South Dakota"),
    ("Tenn", "Tennessee"),
    ("Tex", "Texas"),
    ("Vt", "Vermont"),
    ("Va", "Virginia"),
    ("Wash", "Washington"),
    ("W.Va", "West Virginia"),
    ("W. Va", "West Virginia"),
    ("W.V", "West Virginia"),
    ("W. V", "West Virginia"),
    ("Wis", "Wisconsin"),
    ("Wyo", "Wyoming"),
    ("D.C", "District of Columbia"),
    ("D. C", "District of Columbia"),
];

/// Extract and clean a state name from section-heading text
///
/// Strips the trailing period, resolves known abbreviations, and passes
/// unrecognized names through unchanged (OCR misreadings are still better
/// than losing the section context). Returns `None` for empty input.
pub fn clean_state_name(text: &str) -> Option<String> {
    let state = text.trim().trim_end_matches('.').trim();
    if state.is_empty() {
        return None;
    }

    if crate::constants::REGION_HEADING_KEYWORDS.contains(&state)
        || EXTRA_VALID_STATES.contains(&state)
    {
        return Some(state.to_string());
    }

    for (abbr, full) in STATE_ABBREVIATIONS {
        if state.starts_with(abbr) {
            return Some((*full).to_string());
        }
    }

    Some(state.to_string())
}
