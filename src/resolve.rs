//! Tolerant column-name resolution.
//!
//! Resolution runs in two passes: an exact pass over the candidates in priority order, then a
//! normalized pass where both sides are trimmed, lower-cased, stripped of separators and have
//! Turkish letters folded to their ASCII base.

use std::collections::HashMap;

/// Normalize a header or alias for tolerant comparison.
pub fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' | '_' | '-' => None,
            // dot left behind by lower-casing 'İ'
            '\u{0307}' => None,
            'ı' => Some('i'),
            'ş' => Some('s'),
            'ğ' => Some('g'),
            'ö' => Some('o'),
            'ü' => Some('u'),
            'ç' => Some('c'),
            c => Some(c),
        })
        .collect()
}

/// Find the column matching the first candidate that resolves.
///
/// Every candidate is tried literally before any is tried in normalized form, so an exact
/// hit on a low-priority alias beats a normalized hit on a high-priority one. Returns `None`
/// when nothing matches.
pub fn resolve_column(columns: &[String], candidates: &[String]) -> Option<String> {
    for cand in candidates {
        if let Some(col) = columns.iter().find(|c| *c == cand) {
            return Some(col.clone());
        }
    }

    // first column wins when two headers normalize the same way
    let mut normalized: HashMap<String, &String> = HashMap::with_capacity(columns.len());
    for col in columns {
        normalized.entry(normalize_label(col)).or_insert(col);
    }

    candidates
        .iter()
        .find_map(|cand| normalized.get(&normalize_label(cand)))
        .map(|col| (*col).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_normalize_label_folds_turkish_letters() {
        assert_eq!(normalize_label("  Çağrı Tarih_Saati "), "cagritarihsaati");
        assert_eq!(normalize_label("Müşteri-Temsilcisi"), "musteritemsilcisi");
        assert_eq!(normalize_label("Skill İsmi"), "skillismi");
        assert_eq!(normalize_label("ŞİKAYET"), "sikayet");
    }

    #[test]
    fn test_exact_pass_completes_before_normalized_pass() {
        let columns = s(&["lokasyon", "Site"]);
        // "Lokasyon" only matches after folding, "Site" matches literally
        let got = resolve_column(&columns, &s(&["Lokasyon", "Site"]));
        assert_eq!(got.as_deref(), Some("Site"));
    }

    #[test]
    fn test_exact_match_follows_candidate_order() {
        let columns = s(&["Temsilci", "Agent"]);
        let got = resolve_column(&columns, &s(&["Agent", "Temsilci"]));
        assert_eq!(got.as_deref(), Some("Agent"));
    }

    #[test]
    fn test_uppercase_column_resolves_through_folding() {
        let got = resolve_column(&s(&["LOKASYON"]), &s(&["Lokasyon"]));
        assert_eq!(got.as_deref(), Some("LOKASYON"));
    }

    #[test]
    fn test_skill_ismi_needs_literal_alias() {
        let columns = s(&["Skill İsmi"]);
        assert_eq!(resolve_column(&columns, &s(&["Skill"])), None);
        assert_eq!(
            resolve_column(&columns, &s(&["Skill", "Skill İsmi"])).as_deref(),
            Some("Skill İsmi")
        );
        // folded spelling also resolves through the normalized pass
        assert_eq!(
            resolve_column(&columns, &s(&["skill_ismi"])).as_deref(),
            Some("Skill İsmi")
        );
    }

    #[test]
    fn test_separator_and_whitespace_drift() {
        let columns = s(&[" Takim_Lideri ", "Puan"]);
        assert_eq!(
            resolve_column(&columns, &s(&["Takım Lideri"])).as_deref(),
            Some(" Takim_Lideri ")
        );
    }

    #[test]
    fn test_no_match_is_none() {
        assert_eq!(resolve_column(&s(&["A", "B"]), &s(&["Agent"])), None);
        assert_eq!(resolve_column(&[], &s(&["Agent"])), None);
        assert_eq!(resolve_column(&s(&["Agent"]), &[]), None);
    }
}
