use anyhow::{Context, Result};
use regex::Regex;

use super::{ContactChannel, MaxChannelRule, ParserConfig};

/// The contact rules, in the order they are consulted. The first match wins
/// and suppresses every later rule.
const CASCADE: [ContactRule; 4] = [
    ContactRule::Telegram,
    ContactRule::Email,
    ContactRule::Vk,
    ContactRule::Phone,
];

#[derive(Debug, Clone, Copy)]
enum ContactRule {
    Telegram,
    Email,
    Vk,
    Phone,
}

/// Finds at most one contact channel + identifier in the scoped text.
pub struct ContactExtractor {
    telegram: Regex,
    email: Regex,
    vk: Regex,
    phone: Regex,
    whatsapp_hint: Regex,
    max_hint: Regex,
    max_rule: MaxChannelRule,
}

impl ContactExtractor {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        Ok(Self {
            telegram: Regex::new(r"@([A-Za-z0-9_]{4,32})").context("telegram pattern")?,
            email: Regex::new(r"\b[\w.\-]+@[\w.\-]+\.\w+\b").context("email pattern")?,
            vk: Regex::new(r"(?:vk\.com/[A-Za-z0-9_.]+|\bid\d+\b)").context("vk pattern")?,
            phone: Regex::new(r"(?:\+7|8)\d{10}").context("phone pattern")?,
            whatsapp_hint: keyword_hint(&config.whatsapp_keywords)
                .context("whatsapp keyword pattern")?,
            max_hint: keyword_hint(&config.max_keywords).context("max keyword pattern")?,
            max_rule: config.max_channel_rule,
        })
    }

    pub fn extract(&self, text: &str) -> (Option<String>, Option<ContactChannel>) {
        for rule in CASCADE {
            if let Some((identifier, channel)) = self.apply(rule, text) {
                return (Some(identifier), Some(channel));
            }
        }
        // Relaxed mode: a bare keyword mention is reported as a MAX lead
        // with no identifier.
        if self.max_rule == MaxChannelRule::KeywordOnly && self.max_hint.is_match(text) {
            return (None, Some(ContactChannel::Max));
        }
        (None, None)
    }

    fn apply(&self, rule: ContactRule, text: &str) -> Option<(String, ContactChannel)> {
        match rule {
            ContactRule::Telegram => self
                .telegram
                .captures(text)
                .map(|c| (format!("@{}", &c[1]), ContactChannel::Telegram)),
            ContactRule::Email => self
                .email
                .find(text)
                .map(|m| (m.as_str().to_string(), ContactChannel::Email)),
            ContactRule::Vk => self
                .vk
                .find(text)
                .map(|m| (m.as_str().to_string(), ContactChannel::Vk)),
            ContactRule::Phone => self.phone.find(text).map(|m| {
                let channel = if self.whatsapp_hint.is_match(text) {
                    ContactChannel::WhatsApp
                } else if self.max_hint.is_match(text) {
                    ContactChannel::Max
                } else {
                    ContactChannel::Phone
                };
                (normalize_phone(m.as_str()), channel)
            }),
        }
    }
}

fn keyword_hint(keywords: &[String]) -> Result<Regex> {
    let alternatives = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).map_err(Into::into)
}

/// "8XXXXXXXXXX" and "7XXXXXXXXXX" become "+7XXXXXXXXXX"; anything else is
/// returned as matched.
fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && (digits.starts_with('8') || digits.starts_with('7')) {
        format!("+7{}", &digits[1..])
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ContactExtractor {
        ContactExtractor::new(&ParserConfig::default()).unwrap()
    }

    fn with_max_rule(rule: MaxChannelRule) -> ContactExtractor {
        let config = ParserConfig {
            max_channel_rule: rule,
            ..ParserConfig::default()
        };
        ContactExtractor::new(&config).unwrap()
    }

    #[test]
    fn test_telegram_handle() {
        let e = extractor();
        assert_eq!(
            e.extract("пишите @ivan_petrov вечером"),
            (
                Some("@ivan_petrov".to_string()),
                Some(ContactChannel::Telegram)
            )
        );
    }

    #[test]
    fn test_telegram_beats_phone() {
        let e = extractor();
        let (id, channel) = e.extract("@ivan_petrov или 89261234567");
        assert_eq!(id.as_deref(), Some("@ivan_petrov"));
        assert_eq!(channel, Some(ContactChannel::Telegram));
    }

    #[test]
    fn test_email() {
        let e = extractor();
        // The two-letter domain label keeps the telegram rule out.
        assert_eq!(
            e.extract("почта ivan@ya.ru"),
            (Some("ivan@ya.ru".to_string()), Some(ContactChannel::Email))
        );
    }

    #[test]
    fn test_vk_link_and_bare_id() {
        let e = extractor();
        assert_eq!(
            e.extract("страница vk.com/ivan.petrov"),
            (
                Some("vk.com/ivan.petrov".to_string()),
                Some(ContactChannel::Vk)
            )
        );
        assert_eq!(
            e.extract("профиль id12345"),
            (Some("id12345".to_string()), Some(ContactChannel::Vk))
        );
    }

    #[test]
    fn test_phone_normalization() {
        let e = extractor();
        assert_eq!(
            e.extract("89261234567"),
            (
                Some("+79261234567".to_string()),
                Some(ContactChannel::Phone)
            )
        );
        assert_eq!(
            e.extract("+79261234567"),
            (
                Some("+79261234567".to_string()),
                Some(ContactChannel::Phone)
            )
        );
    }

    #[test]
    fn test_whatsapp_keyword_reclassifies_phone() {
        let e = extractor();
        assert_eq!(
            e.extract("whatsapp 89261234567"),
            (
                Some("+79261234567".to_string()),
                Some(ContactChannel::WhatsApp)
            )
        );
        assert_eq!(
            e.extract("ватсап 89261234567").1,
            Some(ContactChannel::WhatsApp)
        );
    }

    #[test]
    fn test_max_keyword_reclassifies_phone() {
        let e = extractor();
        assert_eq!(
            e.extract("напишите в MAX 89261234567"),
            (Some("+79261234567".to_string()), Some(ContactChannel::Max))
        );
    }

    #[test]
    fn test_whatsapp_beats_max_hint() {
        let e = extractor();
        assert_eq!(
            e.extract("whatsapp или max 89261234567").1,
            Some(ContactChannel::WhatsApp)
        );
    }

    #[test]
    fn test_bare_max_keyword_strict_default() {
        let e = with_max_rule(MaxChannelRule::IdentifierRequired);
        assert_eq!(e.extract("пишите в max"), (None, None));
    }

    #[test]
    fn test_bare_max_keyword_relaxed() {
        let e = with_max_rule(MaxChannelRule::KeywordOnly);
        assert_eq!(e.extract("пишите в max"), (None, Some(ContactChannel::Max)));
    }

    #[test]
    fn test_no_contact() {
        let e = extractor();
        assert_eq!(e.extract("Рост 176 Вес 80"), (None, None));
        assert_eq!(e.extract(""), (None, None));
    }
}
