//! Brand mention scoring for a single response.
//!
//! Mentions are literal, case-insensitive occurrences of a brand name. Each
//! brand gets a score from a fixed rubric:
//!
//! | Signal                                          | Points |
//! |-------------------------------------------------|--------|
//! | Mentioned at all                                | 1      |
//! | Mentioned in the first paragraph                | 3      |
//! | Mentioned more than twice                       | 2      |
//! | Mentioned before every other mentioned brand    | 2      |
//!
//! Callers must pass a brand list without duplicate names: two entries with
//! the same name are scored independently and would be counted twice by the
//! aggregator.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Maximum points a brand can earn in a single response (1 + 3 + 2 + 2).
pub const MAX_SCORE_PER_RESPONSE: u32 = 8;

const MENTION_POINTS: u32 = 1;
const FIRST_PARAGRAPH_POINTS: u32 = 3;
const FREQUENCY_POINTS: u32 = 2;
const POSITION_LEAD_POINTS: u32 = 2;

/// Mentions needed before the frequency bonus applies (strictly more than this).
const FREQUENCY_THRESHOLD: u32 = 2;

/// Scored mention data for one brand in one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisItem {
    pub brand: String,
    pub mentioned: bool,
    pub total_mentions: u32,
    /// Character offset of the first case-insensitive occurrence, `-1` if none.
    pub first_position: i64,
    pub in_first_paragraph: bool,
    pub score: u32,
}

/// Returns the first non-blank paragraph of `text`, or `""` if there is none.
///
/// Paragraphs are separated by two or more consecutive newlines.
pub fn first_paragraph(text: &str) -> &str {
    paragraph_separator()
        .split(text)
        .find(|p| !p.trim().is_empty())
        .unwrap_or("")
}

/// Score every brand's visibility in `text`.
///
/// Returns one item per brand, in input order. `_primary_brand` does not
/// affect scoring.
pub fn analyze_response(text: &str, brands: &[String], _primary_brand: &str) -> Vec<AnalysisItem> {
    if brands.is_empty() {
        return Vec::new();
    }

    let lower_text = text.to_lowercase();
    let lower_first_paragraph = first_paragraph(text).to_lowercase();

    let detected: Vec<AnalysisItem> = brands
        .iter()
        .map(|brand| detect_mentions(text, &lower_text, &lower_first_paragraph, brand))
        .collect();

    // The position-lead bonus compares against the other brands, so scoring
    // only starts once every brand has been located.
    detected
        .iter()
        .map(|item| AnalysisItem {
            score: score_item(item, &detected),
            ..item.clone()
        })
        .collect()
}

fn paragraph_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"\n\n+").expect("paragraph separator pattern is valid"))
}

fn detect_mentions(
    text: &str,
    lower_text: &str,
    lower_first_paragraph: &str,
    brand: &str,
) -> AnalysisItem {
    if brand.is_empty() {
        return AnalysisItem {
            brand: String::new(),
            mentioned: false,
            total_mentions: 0,
            first_position: -1,
            in_first_paragraph: false,
            score: 0,
        };
    }

    let lower_brand = brand.to_lowercase();
    let total_mentions = count_literal_matches(text, lower_text, brand, &lower_brand);

    AnalysisItem {
        brand: brand.to_string(),
        mentioned: total_mentions > 0,
        total_mentions,
        first_position: char_offset(lower_text, &lower_brand),
        in_first_paragraph: lower_first_paragraph.contains(&lower_brand),
        score: 0,
    }
}

/// Count non-overlapping case-insensitive literal occurrences of `brand`.
fn count_literal_matches(text: &str, lower_text: &str, brand: &str, lower_brand: &str) -> u32 {
    let count = match RegexBuilder::new(&regex::escape(brand))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern.find_iter(text).count(),
        Err(e) => {
            tracing::debug!("Literal pattern for {:?} unavailable ({}), using substring count", brand, e);
            lower_text.matches(lower_brand).count()
        }
    };
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn char_offset(haystack: &str, needle: &str) -> i64 {
    match haystack.find(needle) {
        Some(byte_idx) => haystack[..byte_idx].chars().count() as i64,
        None => -1,
    }
}

fn score_item(item: &AnalysisItem, all: &[AnalysisItem]) -> u32 {
    if !item.mentioned {
        return 0;
    }

    let mut score = MENTION_POINTS;
    if item.in_first_paragraph {
        score += FIRST_PARAGRAPH_POINTS;
    }
    if item.total_mentions > FREQUENCY_THRESHOLD {
        score += FREQUENCY_POINTS;
    }

    // Unmentioned competitors are not part of the comparison at all.
    let leads_all = all
        .iter()
        .filter(|other| other.brand != item.brand && other.mentioned)
        .all(|other| item.first_position < other.first_position);
    if leads_all {
        score += POSITION_LEAD_POINTS;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brands(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn find<'a>(items: &'a [AnalysisItem], brand: &str) -> &'a AnalysisItem {
        items.iter().find(|i| i.brand == brand).unwrap()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let text = "Acme is the best. \n\nOthers like Foo and Bar exist.";
        let items = analyze_response(text, &brands(&["Acme", "Foo", "Bar"]), "Acme");

        assert_eq!(items.len(), 3);
        let acme = find(&items, "Acme");
        assert!(acme.mentioned);
        assert_eq!(acme.total_mentions, 1);
        assert_eq!(acme.first_position, 0);
        assert!(acme.in_first_paragraph);
        assert_eq!(acme.score, 6);

        for name in ["Foo", "Bar"] {
            let item = find(&items, name);
            assert!(item.mentioned);
            assert!(!item.in_first_paragraph);
            assert_eq!(item.score, 1);
        }
    }

    #[test]
    fn test_preserves_input_order() {
        let items = analyze_response("Zeta then Alpha", &brands(&["Zeta", "Missing", "Alpha"]), "");
        let names: Vec<&str> = items.iter().map(|i| i.brand.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Missing", "Alpha"]);
    }

    #[test]
    fn test_unmentioned_brand() {
        let items = analyze_response("Nothing relevant here.", &brands(&["Acme"]), "Acme");
        let acme = &items[0];
        assert!(!acme.mentioned);
        assert_eq!(acme.total_mentions, 0);
        assert_eq!(acme.first_position, -1);
        assert!(!acme.in_first_paragraph);
        assert_eq!(acme.score, 0);
    }

    #[test]
    fn test_empty_brand_list() {
        assert!(analyze_response("Acme rocks", &[], "Acme").is_empty());
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let text = "Cxx is not the same as C++. Use C++ daily.";
        let items = analyze_response(text, &brands(&["C++"]), "");
        assert_eq!(items[0].total_mentions, 2);
        assert_eq!(items[0].first_position, 23);

        let items = analyze_response("Cab and Cxy only", &brands(&["C.."]), "");
        assert!(!items[0].mentioned);
    }

    #[test]
    fn test_metacharacter_only_brand() {
        let items = analyze_response("Regex fans write .*? a lot", &brands(&[".*?", "(|)"]), "");
        assert_eq!(items[0].total_mentions, 1);
        assert!(!items[1].mentioned);
    }

    #[test]
    fn test_case_insensitive_counting() {
        let text = "ACME, acme and AcMe.";
        let items = analyze_response(text, &brands(&["Acme"]), "Acme");
        assert_eq!(items[0].total_mentions, 3);
        assert_eq!(items[0].first_position, 0);
        // 1 + 3 (first paragraph) + 2 (frequency) + 2 (only brand)
        assert_eq!(items[0].score, MAX_SCORE_PER_RESPONSE);
    }

    #[test]
    fn test_single_late_mention_behind_competitor_scores_base_only() {
        let text = "Intro about Rival.\n\nLater, Acme shows up.";
        let items = analyze_response(text, &brands(&["Acme", "Rival"]), "Acme");
        assert_eq!(find(&items, "Acme").score, 1);
        // Rival: 1 + 3 + 2
        assert_eq!(find(&items, "Rival").score, 6);
    }

    #[test]
    fn test_only_mentioned_brand_gets_position_bonus() {
        let text = "First paragraph talks about nothing.\n\nThe end mentions Acme.";
        let items = analyze_response(text, &brands(&["Acme", "Foo", "Bar"]), "Acme");
        // 1 base + 2 position lead, no competitors mentioned
        assert_eq!(find(&items, "Acme").score, 3);
        assert_eq!(find(&items, "Foo").score, 0);
    }

    #[test]
    fn test_frequency_bonus_needs_more_than_two() {
        let two = analyze_response("x\n\nAcme Acme", &brands(&["Acme"]), "");
        assert_eq!(two[0].score, 1 + 2);

        let three = analyze_response("x\n\nAcme Acme Acme", &brands(&["Acme"]), "");
        assert_eq!(three[0].score, 1 + 2 + 2);
    }

    #[test]
    fn test_shared_first_position_earns_no_lead() {
        // "Acme" and "Acme Pro" both start at offset 0
        let items = analyze_response("Acme Pro is here", &brands(&["Acme", "Acme Pro"]), "");
        assert_eq!(find(&items, "Acme").score, 4);
        assert_eq!(find(&items, "Acme Pro").score, 4);
    }

    #[test]
    fn test_first_paragraph_skips_blank_paragraphs() {
        assert_eq!(first_paragraph("\n\n   \n\nReal start\n\nnext"), "Real start");
        assert_eq!(first_paragraph("single line"), "single line");
        assert_eq!(first_paragraph(""), "");
        assert_eq!(first_paragraph("  \n\n\t"), "");
    }

    #[test]
    fn test_single_newline_does_not_split_paragraphs() {
        let text = "Line one\nAcme on line two\n\nRest";
        let items = analyze_response(text, &brands(&["Acme"]), "");
        assert!(items[0].in_first_paragraph);
    }

    #[test]
    fn test_position_is_character_offset() {
        let items = analyze_response("Café Ünïcode Acme", &brands(&["Acme"]), "");
        assert_eq!(items[0].first_position, 13);
    }

    #[test]
    fn test_scores_stay_within_ceiling() {
        let text = include_str!("../../fixtures/sample_response.txt");
        let list = brands(&["Acme", "Globex", "Initech", "Umbrella", "Hooli"]);
        let items = analyze_response(text, &list, "Acme");
        assert_eq!(items.len(), list.len());
        for item in &items {
            assert!(item.score <= MAX_SCORE_PER_RESPONSE);
            if !item.mentioned {
                assert_eq!(item.score, 0);
                assert_eq!(item.first_position, -1);
            }
        }
        assert!(find(&items, "Acme").mentioned);
        assert!(!find(&items, "Hooli").mentioned);
    }
}
