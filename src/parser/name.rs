use anyhow::{Context, Result};
use regex::Regex;

use super::Alphabet;

/// Capitalized words that are field labels, not name parts. The labeled
/// pattern is greedy and can swallow the next label on the card, so the
/// capture is truncated at the first of these.
const LABEL_WORDS: [&str; 5] = ["Имя", "ФИО", "Телефон", "Вес", "Рост"];

/// Finds a human name in the full normalized text. A labeled "Имя"/"ФИО"
/// pattern always wins over the unlabeled two-capitalized-words fallback,
/// even when the fallback would match earlier in the text.
pub struct NameExtractor {
    labeled: Regex,
    fallback: Regex,
}

impl NameExtractor {
    pub fn new(alphabet: &Alphabet) -> Result<Self> {
        let word = alphabet.capitalized_word();
        let labeled = Regex::new(&format!(
            r"(?:\bИмя\b|\bФИО\b)\s*[:\-]?\s*({word}(?:\s+{word}){{1,2}})"
        ))
        .context("labeled name pattern")?;
        let fallback =
            Regex::new(&format!(r"\b{word} {word}\b")).context("fallback name pattern")?;
        Ok(Self { labeled, fallback })
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        if let Some(captures) = self.labeled.captures(text) {
            let words: Vec<&str> = captures[1]
                .split_whitespace()
                .take_while(|word| !LABEL_WORDS.contains(word))
                .collect();
            if !words.is_empty() {
                return Some(words.join(" "));
            }
        }
        self.fallback.find(text).map(|m| m.as_str().to_string())
    }
}
