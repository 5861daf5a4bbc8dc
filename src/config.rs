use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::parser::ParserConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub export: Option<ExportConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Users allowed to submit leads (screenshot senders).
    pub admin_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_command")]
    pub command: String,
    #[serde(default = "default_ocr_languages")]
    pub languages: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            command: default_ocr_command(),
            languages: default_ocr_languages(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    /// CSV ledger every saved lead is appended to.
    pub master_csv: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("leadscan.db")
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}

fn default_ocr_languages() -> String {
    "rus+eng".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{MaxChannelRule, ScopeFallback};

    #[test]
    fn test_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"
            admin_ids = [42]
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.admin_ids, vec![42]);
        assert_eq!(config.database.path, PathBuf::from("leadscan.db"));
        assert_eq!(config.ocr.command, "tesseract");
        assert_eq!(config.ocr.languages, "rus+eng");
        assert!(config.export.is_none());
        assert_eq!(config.parser.scope_fallback, ScopeFallback::None);
        assert_eq!(
            config.parser.max_channel_rule,
            MaxChannelRule::IdentifierRequired
        );
        assert_eq!(config.parser.height_range.min, 120);
        assert_eq!(config.parser.weight_range.max, 300);
        assert!(!config.parser.glyph_fixes.is_empty());
    }

    #[test]
    fn test_parser_overrides() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"
            admin_ids = []

            [parser]
            scope_fallback = "whole_document"
            max_channel_rule = "keyword_only"
            confirmation_marker = "Проверьте данные"
            glyph_fixes = [["Bec", "Вес"]]
            height_range = { min = 100, max = 230 }

            [export]
            master_csv = "leads.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.parser.scope_fallback, ScopeFallback::WholeDocument);
        assert_eq!(config.parser.max_channel_rule, MaxChannelRule::KeywordOnly);
        assert_eq!(config.parser.confirmation_marker, "Проверьте данные");
        assert_eq!(config.parser.glyph_fixes.len(), 1);
        assert_eq!(config.parser.height_range.min, 100);
        // Unset sections keep their defaults.
        assert_eq!(config.parser.weight_range.min, 35);
        assert_eq!(
            config.export.unwrap().master_csv,
            PathBuf::from("leads.csv")
        );
    }
}
