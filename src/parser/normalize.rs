use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use super::{ParserConfig, ScopeFallback};

/// Turns raw OCR output into the canonical single-line form the extractors
/// are written against: collapsed whitespace, chat timestamps removed, known
/// Latin-for-Cyrillic glyph misreadings corrected, unit tokens rewritten to
/// the canonical "<число> см" / "<число> кг" shape.
pub struct Normalizer {
    whitespace: Regex,
    timestamp: Regex,
    glyph_fixes: Vec<(String, String)>,
    unit_cm: Regex,
    unit_kg: Regex,
    unit_tail: Regex,
}

impl Normalizer {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        Ok(Self {
            whitespace: Regex::new(r"\s+").context("whitespace pattern")?,
            // Message timestamps captured from the screenshot, e.g. "12:45"
            timestamp: Regex::new(r"\b\d{1,2}:\d{2}\b").context("timestamp pattern")?,
            glyph_fixes: config.glyph_fixes.clone(),
            unit_cm: Regex::new(r"(?i)\b(\d{2,3})\s*(?:cm|cм|сm|см)\b")
                .context("centimeter pattern")?,
            unit_kg: Regex::new(r"(?i)\b(\d{2,3})\s*(?:kg|kг|kr|кg|кг)\b")
                .context("kilogram pattern")?,
            unit_tail: Regex::new(r"(см|кг)[,.;:]").context("unit tail pattern")?,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let text = raw.replace(['\n', '\r'], " ");
        let text = self.whitespace.replace_all(text.trim(), " ");
        let text = self.timestamp.replace_all(&text, " ");

        let mut text = text.into_owned();
        // Literal, case-sensitive corrections, in table order.
        for (from, to) in &self.glyph_fixes {
            text = text.replace(from.as_str(), to);
        }

        let text = self.unit_cm.replace_all(&text, "${1} см");
        let text = self.unit_kg.replace_all(&text, "${1} кг");
        // "176 см," would break word-boundary matches downstream.
        let text = self.unit_tail.replace_all(&text, "${1} ");

        self.whitespace.replace_all(text.trim(), " ").into_owned()
    }
}

/// Locates the confirmation block the contact/measurement extractors are
/// restricted to. The name extractor always sees the whole text.
pub struct ScopeSelector {
    marker: Regex,
    fallback: ScopeFallback,
}

impl ScopeSelector {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let marker = RegexBuilder::new(&regex::escape(&config.confirmation_marker))
            .case_insensitive(true)
            .build()
            .context("confirmation marker pattern")?;
        Ok(Self {
            marker,
            fallback: config.scope_fallback,
        })
    }

    pub fn scope<'a>(&self, text: &'a str) -> Option<&'a str> {
        match self.marker.find(text) {
            Some(m) => Some(text[m.end()..].trim()),
            None => match self.fallback {
                ScopeFallback::WholeDocument => Some(text),
                ScopeFallback::None => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserConfig;

    fn normalizer() -> Normalizer {
        Normalizer::new(&ParserConfig::default()).unwrap()
    }

    #[test]
    fn test_collapses_whitespace_and_line_breaks() {
        let n = normalizer();
        assert_eq!(n.normalize("Имя:\n  Иван   Петров\r\n"), "Имя: Иван Петров");
    }

    #[test]
    fn test_removes_chat_timestamps() {
        let n = normalizer();
        assert_eq!(n.normalize("Привет 12:45 Рост 176"), "Привет Рост 176");
        assert_eq!(n.normalize("в 9:05 утра"), "в утра");
    }

    #[test]
    fn test_keeps_phone_digits_intact() {
        let n = normalizer();
        assert_eq!(n.normalize("89261234567"), "89261234567");
    }

    #[test]
    fn test_fixes_latin_glyphs_in_labels() {
        let n = normalizer();
        assert_eq!(n.normalize("Bec: 80"), "Вес: 80");
        assert_eq!(n.normalize("Poct 176"), "Рост 176");
    }

    #[test]
    fn test_canonicalizes_units() {
        let n = normalizer();
        assert_eq!(n.normalize("176cm 80kg"), "176 см 80 кг");
        assert_eq!(n.normalize("176cм, 80kr"), "176 см 80 кг");
        assert_eq!(n.normalize("176 СМ и 80 КГ"), "176 см и 80 кг");
    }

    #[test]
    fn test_four_digit_numbers_are_not_units() {
        let n = normalizer();
        assert_eq!(n.normalize("1234cm"), "1234cm");
    }

    #[test]
    fn test_strips_punctuation_after_unit() {
        let n = normalizer();
        assert_eq!(n.normalize("176 см; 80 кг."), "176 см 80 кг");
    }

    #[test]
    fn test_idempotent() {
        let n = normalizer();
        for raw in [
            " Рост: 176,  Вес :125 ",
            "Bec 80kg в 12:30",
            "",
            "Имя: Иван Петров 176cm",
        ] {
            let once = n.normalize(raw);
            assert_eq!(n.normalize(&once), once);
        }
    }

    #[test]
    fn test_empty_input() {
        let n = normalizer();
        assert_eq!(n.normalize(""), "");
        assert_eq!(n.normalize("   \n  "), "");
    }

    fn selector(fallback: ScopeFallback) -> ScopeSelector {
        let config = ParserConfig {
            scope_fallback: fallback,
            ..ParserConfig::default()
        };
        ScopeSelector::new(&config).unwrap()
    }

    #[test]
    fn test_scope_after_marker() {
        let s = selector(ScopeFallback::None);
        let text = "болтовня @fake Пожалуйста, подтвердите ваши данные Рост 176";
        assert_eq!(s.scope(text), Some("Рост 176"));
    }

    #[test]
    fn test_scope_marker_case_insensitive() {
        let s = selector(ScopeFallback::None);
        let text = "ПОЖАЛУЙСТА, ПОДТВЕРДИТЕ ВАШИ ДАННЫЕ Вес 80";
        assert_eq!(s.scope(text), Some("Вес 80"));
    }

    #[test]
    fn test_scope_absent_marker_restricts() {
        let s = selector(ScopeFallback::None);
        assert_eq!(s.scope("Рост 176"), None);
    }

    #[test]
    fn test_scope_absent_marker_whole_document() {
        let s = selector(ScopeFallback::WholeDocument);
        assert_eq!(s.scope("Рост 176"), Some("Рост 176"));
    }
}
