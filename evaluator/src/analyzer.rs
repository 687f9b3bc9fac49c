//! Deterministic linguistic metrics for Arabic model output.
//!
//! Everything here is pure and total: the same text and dialect always yield
//! the same [`LinguisticMetrics`], and no input makes [`analyze`] fail.

use crate::request::Dialect;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

/// Marker words per regional dialect.
///
/// The table order is the tie-break order for dialect detection.
pub const DIALECT_MARKERS: [(Dialect, &[&str]); 5] = [
    (
        Dialect::Gulf,
        &["وش", "شلون", "ليش", "حاطط", "يبي", "وايد", "زين", "عاد", "هي", "اهواي"],
    ),
    (
        Dialect::Egyptian,
        &["إيه", "ازيك", "ده", "دي", "بتاع", "بتاعت", "عامل", "كويس", "صح", "يعني"],
    ),
    (
        Dialect::Levantine,
        &["شو", "كيفك", "هيك", "هلق", "رح", "عم", "متل", "لأ", "مش", "بدي"],
    ),
    (
        Dialect::Maghrebi,
        &["واش", "كيفاش", "بصح", "ديما", "بزاف", "نتا", "هو", "راه", "باه"],
    ),
    (
        Dialect::Iraqi,
        &["شكو", "ماكو", "هواية", "عدنا", "گلبي", "پاشا", "لو", "سدير"],
    ),
];

pub const TECHNICAL_TERMS: &[&str] = &[
    "خوارزمية",
    "تعلم آلي",
    "شبكة عصبية",
    "بيانات ضخمة",
    "ذكاء اصطناعي",
    "برمجة",
    "قاعدة بيانات",
    "واجهة برمجة",
    "حوسبة سحابية",
    "أمن معلومات",
    "تشفير",
    "معالجة لغة",
    "رؤية حاسوبية",
    "نموذج لغوي",
    "محول",
    "انتباه",
    "نقل تعلم",
    "ضبط دقيق",
    "بيانات التدريب",
];

pub const FORMAL_MARKERS: &[&str] = &[
    "إن",
    "إذ",
    "حيث",
    "غير أن",
    "بيد أن",
    "علاوة على",
    "فضلاً عن",
    "ثمة",
    "لذلك",
    "وعليه",
    "مما يستوجب",
    "في ضوء",
    "استناداً",
];

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{0600}-\x{06FF}\w]+").expect("token pattern is valid"));

static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?؟،\n]+").expect("sentence pattern is valid"));

/// Arabic, Arabic Supplement, and Presentation Forms A/B.
pub fn is_arabic_char(c: char) -> bool {
    matches!(
        c,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEEF}'
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinguisticMetrics {
    pub token_count: usize,
    pub arabic_token_count: usize,
    pub arabic_char_ratio: f64,
    /// `None` only for empty input; serialized as `"unknown"`.
    #[serde(
        serialize_with = "serialize_detected",
        deserialize_with = "deserialize_detected"
    )]
    pub detected_dialect: Option<Dialect>,
    pub dialect_match: bool,
    pub sentence_count: usize,
    pub avg_sentence_length_tokens: f64,
    pub formal_marker_count: usize,
    pub technical_term_count: usize,
    pub unique_word_ratio: f64,
}

impl LinguisticMetrics {
    /// Metrics reported for empty or whitespace-only text.
    pub fn empty() -> Self {
        Self {
            token_count: 0,
            arabic_token_count: 0,
            arabic_char_ratio: 0.0,
            detected_dialect: None,
            dialect_match: false,
            sentence_count: 0,
            avg_sentence_length_tokens: 0.0,
            formal_marker_count: 0,
            technical_term_count: 0,
            unique_word_ratio: 0.0,
        }
    }
}

fn serialize_detected<S: Serializer>(value: &Option<Dialect>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(value.map(|d| d.as_str()).unwrap_or("unknown"))
}

fn deserialize_detected<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Dialect>, D::Error> {
    let raw = String::deserialize(d)?;
    if raw == "unknown" {
        return Ok(None);
    }
    raw.parse::<Dialect>()
        .map(Some)
        .map_err(serde::de::Error::custom)
}

pub fn analyze(text: &str, dialect: Dialect) -> LinguisticMetrics {
    if text.trim().is_empty() {
        return LinguisticMetrics::empty();
    }

    let tokens = tokenize(text);
    let sentences = split_sentences(text);
    let detected = detect_dialect(text);
    let lower = text.to_lowercase();

    let token_count = tokens.len();
    let unique: HashSet<&str> = tokens.iter().copied().collect();

    LinguisticMetrics {
        token_count,
        arabic_token_count: tokens
            .iter()
            .filter(|t| t.chars().any(is_arabic_char))
            .count(),
        arabic_char_ratio: arabic_ratio(text),
        detected_dialect: Some(detected),
        dialect_match: detected == dialect || detected == Dialect::Msa,
        sentence_count: sentences.len(),
        avg_sentence_length_tokens: if sentences.is_empty() {
            0.0
        } else {
            token_count as f64 / sentences.len() as f64
        },
        formal_marker_count: count_present(&lower, FORMAL_MARKERS),
        technical_term_count: count_present(&lower, TECHNICAL_TERMS),
        unique_word_ratio: if token_count == 0 {
            0.0
        } else {
            unique.len() as f64 / token_count as f64
        },
    }
}

/// Share of non-whitespace characters in the Arabic blocks, rounded to 3 places.
pub fn arabic_ratio(text: &str) -> f64 {
    let (total, arabic) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(total, arabic), c| {
            (total + 1, arabic + usize::from(is_arabic_char(c)))
        });
    if total == 0 {
        return 0.0;
    }
    round_to(arabic as f64 / total as f64, 3)
}

pub fn tokenize(text: &str) -> Vec<&str> {
    TOKEN_PATTERN.find_iter(text).map(|m| m.as_str()).collect()
}

pub fn split_sentences(text: &str) -> Vec<&str> {
    SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Dialect with the most distinct markers present; the earlier table entry
/// wins ties and zero markers means MSA.
pub fn detect_dialect(text: &str) -> Dialect {
    let lower = text.to_lowercase();
    let mut best = Dialect::Msa;
    let mut best_count = 0;

    for (dialect, markers) in DIALECT_MARKERS {
        let count = count_present(&lower, markers);
        if count > best_count {
            best = dialect;
            best_count = count;
        }
    }
    best
}

/// Number of markers that occur at least once.
fn count_present(haystack: &str, markers: &[&str]) -> usize {
    markers.iter().filter(|m| haystack.contains(*m)).count()
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_arabic_ratio() {
        let metrics = analyze("مرحباً بالعالم العربي الجميل", Dialect::Msa);
        assert!(metrics.arabic_char_ratio > 0.7);
    }

    #[test]
    fn test_pure_english_ratio() {
        let metrics = analyze("Hello world this is English text", Dialect::Msa);
        assert!(metrics.arabic_char_ratio < 0.1);
        assert_eq!(metrics.arabic_token_count, 0);
        assert_eq!(metrics.token_count, 6);
    }

    #[test]
    fn test_mixed_ratio() {
        let metrics = analyze("The model (النموذج) uses deep learning (تعلم عميق)", Dialect::Msa);
        assert!(metrics.arabic_char_ratio > 0.1 && metrics.arabic_char_ratio < 0.9);
        assert_eq!(metrics.arabic_token_count, 3);
    }

    #[test]
    fn test_ratio_rounded_to_three_places() {
        // 1 Arabic char out of 3
        assert_eq!(arabic_ratio("aبc"), 0.333);
        assert_eq!(arabic_ratio("   "), 0.0);
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        assert_eq!(analyze("", Dialect::Gulf), LinguisticMetrics::empty());
        assert_eq!(analyze(" \n\t ", Dialect::Msa), LinguisticMetrics::empty());

        let json = serde_json::to_value(LinguisticMetrics::empty()).unwrap();
        assert_eq!(json["detected_dialect"], "unknown");
        assert_eq!(json["token_count"], 0);
    }

    #[test]
    fn test_gulf_detection() {
        let metrics = analyze("وش وايد زين", Dialect::Gulf);
        assert_eq!(metrics.detected_dialect, Some(Dialect::Gulf));
        assert!(metrics.dialect_match);
    }

    #[test]
    fn test_egyptian_detection() {
        assert_eq!(detect_dialect("إيه رأيك في ده؟ ده موضوع كويس"), Dialect::Egyptian);
    }

    #[test]
    fn test_levantine_detection() {
        assert_eq!(detect_dialect("شو رأيك بهيك موضوع؟ هلق رح نبدأ"), Dialect::Levantine);
    }

    #[test]
    fn test_msa_default() {
        let metrics = analyze("إن الذكاء الاصطناعي يمثل ثورة تقنية حقيقية", Dialect::Egyptian);
        assert_eq!(metrics.detected_dialect, Some(Dialect::Msa));
        // MSA is acceptable for any requested dialect
        assert!(metrics.dialect_match);
    }

    #[test]
    fn test_tie_resolves_to_table_order() {
        // one Gulf marker, one Egyptian marker
        assert_eq!(detect_dialect("زين كويس"), Dialect::Gulf);
        assert_eq!(detect_dialect("كويس زين"), Dialect::Gulf);
    }

    #[test]
    fn test_dialect_mismatch() {
        let metrics = analyze("إيه رأيك في ده؟ ده موضوع كويس", Dialect::Gulf);
        assert_eq!(metrics.detected_dialect, Some(Dialect::Egyptian));
        assert!(!metrics.dialect_match);
    }

    #[test]
    fn test_markers_count_presence_not_frequency() {
        assert_eq!(count_present("تشفير تشفير تشفير", TECHNICAL_TERMS), 1);
    }

    #[test]
    fn test_technical_terms() {
        let metrics = analyze(
            "تعتمد خوارزمية التعلم الآلي على شبكة عصبية متعددة الطبقات",
            Dialect::Msa,
        );
        assert!(metrics.technical_term_count >= 2);

        let metrics = analyze("ذهبت إلى السوق واشتريت تفاحاً وبرتقالاً", Dialect::Msa);
        assert_eq!(metrics.technical_term_count, 0);
    }

    #[test]
    fn test_sentence_metrics() {
        let metrics = analyze("هذه جملة أولى. وهذه جملة ثانية. وهذه جملة ثالثة.", Dialect::Msa);
        assert_eq!(metrics.sentence_count, 3);
        assert_eq!(metrics.token_count, 9);
        assert_eq!(metrics.avg_sentence_length_tokens, 3.0);

        assert_eq!(split_sentences("لماذا؟ لأن\nالسماء زرقاء!").len(), 3);
    }

    #[test]
    fn test_unique_word_ratio() {
        let metrics = analyze("كلمة كلمة كلمة كلمة كلمة كلمة", Dialect::Msa);
        assert!(metrics.unique_word_ratio < 0.3);
        assert!((metrics.unique_word_ratio - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let text = "علاوة على ذلك، فإن النموذج اللغوي يعتمد على بيانات التدريب. شو رأيك؟";
        let first = analyze(text, Dialect::Levantine);
        for _ in 0..5 {
            assert_eq!(analyze(text, Dialect::Levantine), first);
        }
        assert!(first.arabic_char_ratio >= 0.0 && first.arabic_char_ratio <= 1.0);
        assert!(first.formal_marker_count >= 1);
    }

    #[test]
    fn test_metrics_roundtrip_through_json() {
        let metrics = analyze("شو رأيك بهيك موضوع؟", Dialect::Levantine);
        let json = serde_json::to_string(&metrics).unwrap();
        let back: LinguisticMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metrics);
    }
}
