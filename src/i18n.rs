//! Per-language field naming and display fallback.
//!
//! Localized columns are stored once per language: the base language keeps the plain name
//! (`name`), every other language carries a suffix (`name_ru`, `name_pt_br`).

use crate::config::LanguageSettings;
use crate::error::AppError;
use serde_json::{Map, Value};

#[derive(Clone, Debug)]
pub struct Localizer {
    base: String,
    /// All configured languages, base included, in configured order.
    languages: Vec<String>,
}

impl Localizer {
    pub fn new(base: impl Into<String>, supported: impl IntoIterator<Item = String>) -> Self {
        let base = base.into().to_lowercase();
        let mut languages: Vec<String> = Vec::new();
        for lang in supported {
            let lang = lang.to_lowercase();
            if !languages.contains(&lang) {
                languages.push(lang);
            }
        }
        if !languages.contains(&base) {
            languages.insert(0, base.clone());
        }
        Localizer { base, languages }
    }

    pub fn from_settings(settings: &LanguageSettings) -> Self {
        Self::new(settings.base.clone(), settings.supported.iter().cloned())
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Languages other than the base, in configured order.
    pub fn translations(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(String::as_str).filter(move |l| *l != self.base)
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l.eq_ignore_ascii_case(language))
    }

    /// Canonical (configured) spelling of a requested language, or `NotFound`.
    pub fn require<'a>(&'a self, language: &str) -> Result<&'a str, AppError> {
        self.languages
            .iter()
            .find(|l| l.eq_ignore_ascii_case(language))
            .map(String::as_str)
            .ok_or_else(|| AppError::NotFound(format!("language '{}'", language)))
    }

    /// Empty for the base language, `_<language>` otherwise.
    pub fn suffix_for(&self, language: &str) -> String {
        if language.eq_ignore_ascii_case(&self.base) {
            String::new()
        } else {
            format!("_{}", language.to_lowercase().replace('-', "_"))
        }
    }

    pub fn resolve_field(&self, base_name: &str, language: &str) -> String {
        format!("{}{}", base_name, self.suffix_for(language))
    }

    /// Requested language, then base, then every other configured language.
    pub fn fallback_order<'a>(&'a self, language: &'a str) -> Vec<&'a str> {
        let mut order = vec![language];
        for lang in std::iter::once(self.base.as_str()).chain(self.languages.iter().map(String::as_str)) {
            if !order.iter().any(|o| o.eq_ignore_ascii_case(lang)) {
                order.push(lang);
            }
        }
        order
    }

    /// First populated value of `base_name` probing languages in fallback order.
    /// `None` when no variant is populated.
    pub fn display_value<'r>(
        &self,
        record: &'r Map<String, Value>,
        base_name: &str,
        language: &str,
        fallback_order: Option<&[&str]>,
    ) -> Option<&'r Value> {
        let default_order;
        let order = match fallback_order {
            Some(o) => o,
            None => {
                default_order = self.fallback_order(language);
                default_order.as_slice()
            }
        };
        order
            .iter()
            .filter_map(|lang| record.get(&self.resolve_field(base_name, lang)))
            .find(|v| is_populated(v))
    }

    /// Per-language view: each localized base key gets its display value and suffixed variants are dropped.
    pub fn localize_record(&self, record: &mut Map<String, Value>, localized: &[String], language: &str) {
        for field in localized {
            let value = self
                .display_value(record, field, language, None)
                .cloned()
                .unwrap_or(Value::Null);
            for lang in self.translations() {
                record.remove(&self.resolve_field(field, lang));
            }
            record.insert(field.clone(), value);
        }
    }
}

fn is_populated(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}
