//! Languages a question can be asked and answered in

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported conversation languages
///
/// Deserializes from the short codes (`En`, `Fr`, `Ar`, case-insensitive)
/// or the English names, and fails with [`UnsupportedLanguage`] otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    #[default]
    English,
    French,
    Arabic,
}

/// A language code outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language '{0}'. Supported languages are: En (English), Fr (French), Ar (Arabic)")]
pub struct UnsupportedLanguage(pub String);

impl Language {
    /// All supported languages
    pub const ALL: [Language; 3] = [Language::English, Language::French, Language::Arabic];

    /// Short code
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "En",
            Self::French => "Fr",
            Self::Arabic => "Ar",
        }
    }

    /// English name, used inside prompts
    pub fn name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::French => "French",
            Self::Arabic => "Arabic",
        }
    }

    pub fn is_english(&self) -> bool {
        matches!(self, Self::English)
    }
}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|lang| {
                lang.code().eq_ignore_ascii_case(wanted) || lang.name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}

impl TryFrom<String> for Language {
    type Error = UnsupportedLanguage;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.code().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_names() {
        assert_eq!("En".parse::<Language>().unwrap(), Language::English);
        assert_eq!("fr".parse::<Language>().unwrap(), Language::French);
        assert_eq!("ARABIC".parse::<Language>().unwrap(), Language::Arabic);
    }

    #[test]
    fn rejects_unknown_codes() {
        let err = "De".parse::<Language>().unwrap_err();
        assert_eq!(err, UnsupportedLanguage("De".to_string()));
        assert!(err.to_string().contains("Supported languages"));
    }

    #[test]
    fn display_uses_english_name() {
        assert_eq!(Language::French.to_string(), "French");
        assert_eq!(Language::Arabic.code(), "Ar");
        assert!(Language::English.is_english());
    }
}
