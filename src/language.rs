//! Heuristic English / Vietnamese language detection.
//!
//! [`detect`] decides which voice speaks a reply.  Two signals are checked in
//! order:
//!
//! 1. Share of Vietnamese diacritic characters (more than 5 % → Vietnamese).
//! 2. Share of whitespace-separated tokens found in a closed list of common
//!    Vietnamese words (more than 20 % → Vietnamese).
//!
//! Anything else, including the empty string, is English.

use std::fmt;

/// Lower-case Vietnamese letters carrying diacritics (plus `đ`).
const VI_DIACRITICS: &str = "àáảãạăằắẳẵặâầấẩẫậèéẻẽẹêềếểễệìíỉĩịòóỏõọôồốổỗộơờớởỡợùúủũụưừứửữựỳýỷỹỵđ";

/// Common Vietnamese function words, compared against lower-cased tokens.
static VI_WORDS: &[&str] = &[
    "xin", "chào", "cảm", "ơn", "không", "có", "là", "của", "và", "được", "này", "đó", "để",
    "cho", "với", "trong", "như", "nhưng", "thì", "mà", "bạn", "tôi", "anh", "chị", "em", "ông",
    "bà", "nó", "họ", "chúng", "làm", "muốn", "biết", "nói", "giúp", "hỏi", "trả", "lời", "dịch",
];

const DIACRITIC_RATIO: f64 = 0.05;
const WORD_RATIO: f64 = 0.2;

/// One of the two supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    En,
    Vi,
}

impl Language {
    /// ISO-639-1 code, as used by the synthesis engines.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Vi => "vi",
        }
    }

    /// BCP-47 locale for speech recognition.
    pub fn locale(&self) -> &'static str {
        match self {
            Language::En => "en-US",
            Language::Vi => "vi-VN",
        }
    }

    /// The other language of the pair.
    pub fn other(&self) -> Language {
        match self {
            Language::En => Language::Vi,
            Language::Vi => Language::En,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Classify `text` as English or Vietnamese.
///
/// ```
/// use translator_mini::language::{detect, Language};
///
/// assert_eq!(detect("Xin chào các bạn"), Language::Vi);
/// assert_eq!(detect("Good morning"), Language::En);
/// assert_eq!(detect(""), Language::En);
/// ```
pub fn detect(text: &str) -> Language {
    let total_chars = text.chars().count();
    if total_chars == 0 {
        return Language::En;
    }

    let lower = text.to_lowercase();

    let vi_chars = lower
        .chars()
        .filter(|c| VI_DIACRITICS.contains(*c))
        .count();
    if vi_chars as f64 / total_chars as f64 > DIACRITIC_RATIO {
        return Language::Vi;
    }

    let tokens: Vec<&str> = lower.split_whitespace().collect();
    if tokens.is_empty() {
        return Language::En;
    }
    let vi_tokens = tokens.iter().filter(|t| VI_WORDS.contains(t)).count();
    if vi_tokens as f64 / tokens.len() as f64 > WORD_RATIO {
        return Language::Vi;
    }

    Language::En
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_default_to_english() {
        assert_eq!(detect(""), Language::En);
        assert_eq!(detect("   \n\t"), Language::En);
    }

    #[test]
    fn ten_percent_diacritics_is_vietnamese() {
        // 1 diacritic out of 10 characters.
        assert_eq!(detect("abcdefghiá"), Language::Vi);
    }

    #[test]
    fn five_percent_exactly_is_not_enough() {
        // 1 diacritic out of 20 characters: ratio is not strictly above 0.05.
        let text = "abcdefghijklmnopqrsá";
        assert_eq!(text.chars().count(), 20);
        assert_eq!(detect(text), Language::En);
    }

    #[test]
    fn plain_english_is_english() {
        assert_eq!(detect("Please translate this sentence for me"), Language::En);
    }

    #[test]
    fn unaccented_vietnamese_words_are_detected() {
        // "xin", "cho", "anh" are in the word list; no diacritics at all.
        assert_eq!(detect("xin cho anh hello"), Language::Vi);
    }

    #[test]
    fn word_matching_ignores_case() {
        assert_eq!(detect("XIN CHO ANH"), Language::Vi);
    }

    #[test]
    fn word_ratio_must_exceed_twenty_percent() {
        // 1 of 5 tokens = 0.2 exactly → English.
        assert_eq!(detect("anh went to the shop"), Language::En);
    }

    #[test]
    fn uppercase_diacritics_count() {
        assert_eq!(detect("ĐÂY LÀ TIẾNG VIỆT"), Language::Vi);
    }

    #[test]
    fn detection_is_deterministic() {
        let sample = "Tôi muốn học tiếng Anh";
        let first = detect(sample);
        for _ in 0..5 {
            assert_eq!(detect(sample), first);
        }
    }

    #[test]
    fn language_codes_and_locales() {
        assert_eq!(Language::Vi.code(), "vi");
        assert_eq!(Language::En.locale(), "en-US");
        assert_eq!(Language::Vi.other(), Language::En);
        assert_eq!(Language::En.to_string(), "en");
    }
}
