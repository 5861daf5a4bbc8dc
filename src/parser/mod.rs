pub mod contact;
pub mod measure;
pub mod name;
pub mod normalize;

use anyhow::Result;
use serde::Deserialize;

use crate::parser::contact::ContactExtractor;
use crate::parser::measure::MeasureExtractor;
use crate::parser::name::NameExtractor;
use crate::parser::normalize::{Normalizer, ScopeSelector};

/// Contact channels a lead can be reached through. "No channel" is the
/// absence of a value, not a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactChannel {
    Telegram,
    WhatsApp,
    Max,
    Vk,
    Email,
    Phone,
}

impl std::fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactChannel::Telegram => write!(f, "Telegram"),
            ContactChannel::WhatsApp => write!(f, "WhatsApp"),
            ContactChannel::Max => write!(f, "MAX"),
            ContactChannel::Vk => write!(f, "VK"),
            ContactChannel::Email => write!(f, "Email"),
            ContactChannel::Phone => write!(f, "Телефон"),
        }
    }
}

/// What the contact/measurement scope becomes when the confirmation marker
/// is absent from the text.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFallback {
    /// Extract from the whole normalized text.
    WholeDocument,
    /// Extract nothing beyond the name (the historical default).
    #[default]
    None,
}

/// Whether a bare "MAX" keyword mention, with no matched identifier, is
/// enough to report the MAX channel.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaxChannelRule {
    #[default]
    IdentifierRequired,
    KeywordOnly,
}

/// Closed interval a measurement must fall in to be accepted.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PlausibleRange {
    pub min: u32,
    pub max: u32,
}

impl PlausibleRange {
    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Character classes for the alphabet names are written in. Kept as data so
/// the case-aware name patterns are not tied to one locale.
#[derive(Debug, Deserialize, Clone)]
pub struct Alphabet {
    pub upper: String,
    pub lower: String,
}

impl Alphabet {
    /// Regex fragment for one capitalized word of this alphabet.
    fn capitalized_word(&self) -> String {
        format!("[{}][{}]+", self.upper, self.lower)
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            upper: "А-ЯЁ".to_string(),
            lower: "а-яё".to_string(),
        }
    }
}

/// Tunable data of the extraction engine: the glyph-correction table, the
/// confirmation marker, keyword sets and plausibility ranges. Everything else
/// about the patterns is fixed.
#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    #[serde(default = "default_confirmation_marker")]
    pub confirmation_marker: String,
    #[serde(default)]
    pub scope_fallback: ScopeFallback,
    #[serde(default)]
    pub max_channel_rule: MaxChannelRule,
    #[serde(default = "default_glyph_fixes")]
    pub glyph_fixes: Vec<(String, String)>,
    #[serde(default = "default_whatsapp_keywords")]
    pub whatsapp_keywords: Vec<String>,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: Vec<String>,
    #[serde(default = "default_height_range")]
    pub height_range: PlausibleRange,
    #[serde(default = "default_weight_range")]
    pub weight_range: PlausibleRange,
    #[serde(default)]
    pub alphabet: Alphabet,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            confirmation_marker: default_confirmation_marker(),
            scope_fallback: ScopeFallback::default(),
            max_channel_rule: MaxChannelRule::default(),
            glyph_fixes: default_glyph_fixes(),
            whatsapp_keywords: default_whatsapp_keywords(),
            max_keywords: default_max_keywords(),
            height_range: default_height_range(),
            weight_range: default_weight_range(),
            alphabet: Alphabet::default(),
        }
    }
}

fn default_confirmation_marker() -> String {
    "Пожалуйста, подтвердите ваши данные".to_string()
}

fn default_glyph_fixes() -> Vec<(String, String)> {
    // Latin look-alikes tesseract swaps in for the Cyrillic field labels.
    [
        ("Bec", "Вес"),
        ("Bес", "Вес"),
        ("Вec", "Вес"),
        ("Poct", "Рост"),
        ("Pocт", "Рост"),
        ("Рocт", "Рост"),
        ("Teлефон", "Телефон"),
        ("Тeлефон", "Телефон"),
        ("Телефoн", "Телефон"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

fn default_whatsapp_keywords() -> Vec<String> {
    ["whatsapp", "вотсап", "ватсап", "вацап"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_max_keywords() -> Vec<String> {
    ["max", "мах"].into_iter().map(str::to_string).collect()
}

fn default_height_range() -> PlausibleRange {
    PlausibleRange { min: 120, max: 220 }
}

fn default_weight_range() -> PlausibleRange {
    PlausibleRange { min: 35, max: 300 }
}

/// What the engine extracted from one screenshot. Absent fields are a normal
/// outcome, never an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub channel: Option<ContactChannel>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
}

impl ExtractionResult {
    fn identifier_for(&self, channel: ContactChannel) -> Option<&str> {
        (self.channel == Some(channel))
            .then_some(self.contact.as_deref())
            .flatten()
    }

    // Legacy per-channel slots: the identifier mirrored into the slot of the
    // channel it belongs to, absent everywhere else.
    pub fn phone(&self) -> Option<&str> {
        self.identifier_for(ContactChannel::Phone)
    }

    pub fn telegram(&self) -> Option<&str> {
        self.identifier_for(ContactChannel::Telegram)
    }

    pub fn whatsapp(&self) -> Option<&str> {
        self.identifier_for(ContactChannel::WhatsApp)
    }

    pub fn max(&self) -> Option<&str> {
        self.identifier_for(ContactChannel::Max)
    }

    pub fn vk(&self) -> Option<&str> {
        self.identifier_for(ContactChannel::Vk)
    }

    pub fn email(&self) -> Option<&str> {
        self.identifier_for(ContactChannel::Email)
    }
}

/// The extraction engine: a normalizer followed by independent extractors
/// for name, contact and measurements. Pure and total — any input string
/// yields a result, degraded to absent fields when nothing matches.
pub struct LeadParser {
    normalizer: Normalizer,
    scope: ScopeSelector,
    names: NameExtractor,
    contacts: ContactExtractor,
    measures: MeasureExtractor,
}

impl LeadParser {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        Ok(Self {
            normalizer: Normalizer::new(config)?,
            scope: ScopeSelector::new(config)?,
            names: NameExtractor::new(&config.alphabet)?,
            contacts: ContactExtractor::new(config)?,
            measures: MeasureExtractor::new(config)?,
        })
    }

    pub fn parse(&self, raw: &str) -> ExtractionResult {
        if raw.trim().is_empty() {
            return ExtractionResult::default();
        }

        let text = self.normalizer.normalize(raw);

        // The name is searched in the whole text; contact and measurements
        // only in the confirmation scope.
        let name = self.names.extract(&text);

        let Some(scope) = self.scope.scope(&text) else {
            return ExtractionResult {
                name,
                ..ExtractionResult::default()
            };
        };

        let (contact, channel) = self.contacts.extract(scope);
        let (weight_kg, height_cm) = self.measures.extract(scope);

        ExtractionResult {
            name,
            contact,
            channel,
            weight_kg,
            height_cm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(config: ParserConfig) -> LeadParser {
        LeadParser::new(&config).unwrap()
    }

    fn whole_document() -> LeadParser {
        parser(ParserConfig {
            scope_fallback: ScopeFallback::WholeDocument,
            ..ParserConfig::default()
        })
    }

    #[test]
    fn test_empty_input_all_absent() {
        let p = whole_document();
        assert_eq!(p.parse(""), ExtractionResult::default());
        assert_eq!(p.parse("   \n\t  "), ExtractionResult::default());
    }

    #[test]
    fn test_labeled_height_and_weight() {
        let p = whole_document();
        let result = p.parse(" Рост: 176,  Вес :125 ");
        assert_eq!(result.height_cm, Some(176.0));
        assert_eq!(result.weight_kg, Some(125.0));
    }

    #[test]
    fn test_full_card_with_marker() {
        let p = parser(ParserConfig::default());
        let raw = "чат 12:45 сообщения\nПожалуйста, подтвердите ваши данные\n\
                   Имя: Иван Петров\nТелефон: 89261234567\nРост 176 Вес 80";
        let result = p.parse(raw);
        assert_eq!(result.name.as_deref(), Some("Иван Петров"));
        assert_eq!(result.contact.as_deref(), Some("+79261234567"));
        assert_eq!(result.channel, Some(ContactChannel::Phone));
        assert_eq!(result.height_cm, Some(176.0));
        assert_eq!(result.weight_kg, Some(80.0));
    }

    #[test]
    fn test_no_marker_restricts_to_name() {
        let p = parser(ParserConfig::default());
        let result = p.parse("Имя: Иван Петров Рост 176 Вес 80 @ivan_petrov");
        assert_eq!(result.name.as_deref(), Some("Иван Петров"));
        assert_eq!(result.contact, None);
        assert_eq!(result.channel, None);
        assert_eq!(result.height_cm, None);
        assert_eq!(result.weight_kg, None);
    }

    #[test]
    fn test_contact_before_marker_is_ignored() {
        let p = parser(ParserConfig::default());
        let raw = "@chat_noise писал 10:15 Пожалуйста, подтвердите ваши данные \
                   телефон 89261234567";
        let result = p.parse(raw);
        assert_eq!(result.contact.as_deref(), Some("+79261234567"));
        assert_eq!(result.channel, Some(ContactChannel::Phone));
    }

    #[test]
    fn test_telegram_beats_phone() {
        let p = whole_document();
        let result = p.parse("@ivan_petrov 89261234567");
        assert_eq!(result.channel, Some(ContactChannel::Telegram));
        assert_eq!(result.contact.as_deref(), Some("@ivan_petrov"));
    }

    #[test]
    fn test_whatsapp_phone() {
        let p = whole_document();
        let result = p.parse("whatsapp 89261234567");
        assert_eq!(result.channel, Some(ContactChannel::WhatsApp));
        assert_eq!(result.contact.as_deref(), Some("+79261234567"));
        assert_eq!(result.whatsapp(), Some("+79261234567"));
        assert_eq!(result.phone(), None);
    }

    #[test]
    fn test_delimited_pair_swap() {
        let p = whole_document();
        for raw in ["176/125", "125/176"] {
            let result = p.parse(raw);
            assert_eq!(result.height_cm, Some(176.0), "input {raw}");
            assert_eq!(result.weight_kg, Some(125.0), "input {raw}");
        }
    }

    #[test]
    fn test_out_of_range_never_surfaces() {
        let p = whole_document();
        assert_eq!(p.parse("999 см").height_cm, None);
        assert_eq!(p.parse("150 см").height_cm, Some(150.0));
    }

    #[test]
    fn test_reparse_of_normalized_text_is_identical() {
        let config = ParserConfig {
            scope_fallback: ScopeFallback::WholeDocument,
            ..ParserConfig::default()
        };
        let p = LeadParser::new(&config).unwrap();
        let normalizer = Normalizer::new(&config).unwrap();
        for raw in [
            " Рост: 176,\n  Вес :125 ",
            "Bec 80kg 12:30 Имя: Иван Петров",
            "whatsapp 89261234567",
        ] {
            let normalized = normalizer.normalize(raw);
            assert_eq!(p.parse(&normalized), p.parse(raw), "input {raw:?}");
        }
    }

    #[test]
    fn test_glyph_confused_labels() {
        let p = whole_document();
        let result = p.parse("Poct 176 Bec 80");
        assert_eq!(result.height_cm, Some(176.0));
        assert_eq!(result.weight_kg, Some(80.0));
    }

    #[test]
    fn test_channel_mirrors() {
        let p = whole_document();
        let result = p.parse("@ivan_petrov");
        assert_eq!(result.telegram(), Some("@ivan_petrov"));
        assert_eq!(result.phone(), None);
        assert_eq!(result.vk(), None);
        assert_eq!(result.email(), None);
        assert_eq!(result.max(), None);
    }

    #[test]
    fn test_binary_garbage_is_survivable() {
        let p = whole_document();
        let garbage = "\u{0}\u{1}\u{fffd}ÿþ§§§";
        let result = p.parse(garbage);
        assert_eq!(result.contact, None);
    }
}
