//! Message catalogs: locale -> message key -> string. Nested JSON objects are
//! flattened into dotted keys (`model.Post.fields.title`).

use crate::config::ResourceConfig;
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

#[derive(Clone, Debug, Default)]
pub struct MessageCatalog {
    locales: HashMap<String, HashMap<String, String>>,
    default_locale: String,
}

fn flatten(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() { k.clone() } else { format!("{}.{}", prefix, k) };
                flatten(&key, v, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Null => {}
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

impl MessageCatalog {
    pub fn new(default_locale: impl Into<String>) -> Self {
        MessageCatalog {
            locales: HashMap::new(),
            default_locale: default_locale.into(),
        }
    }

    pub fn with_messages<I, K, V>(mut self, locale: &str, messages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.locales
            .entry(locale.to_string())
            .or_default()
            .extend(messages.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// `{ "<locale>": { ...messages... } }`.
    pub fn from_json(text: &str, default_locale: &str) -> Result<Self, ConfigError> {
        let doc: HashMap<String, Value> =
            serde_json::from_str(text).map_err(|e| ConfigError::Load(format!("messages: {}", e)))?;
        let mut catalog = MessageCatalog::new(default_locale);
        for (locale, tree) in doc {
            let mut flat = HashMap::new();
            flatten("", &tree, &mut flat);
            catalog.locales.insert(locale, flat);
        }
        Ok(catalog)
    }

    /// Read a catalog from disk. A missing file yields an empty catalog.
    pub async fn load_file(path: impl AsRef<Path>, default_locale: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::from_json(&text, default_locale),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no message catalog, using raw names");
                Ok(MessageCatalog::new(default_locale))
            }
            Err(e) => Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    fn known(&self, tag: &str) -> Option<String> {
        let tag = tag.trim();
        if tag.is_empty() {
            return None;
        }
        if self.locales.contains_key(tag) {
            return Some(tag.to_string());
        }
        let primary = tag.split(['-', '_']).next().unwrap_or(tag);
        self.locales.contains_key(primary).then(|| primary.to_string())
    }

    /// Locale for a request: `?locale=`, then `Accept-Language` by quality, then the default.
    pub fn negotiate(&self, requested: Option<&str>, accept_language: Option<&str>) -> String {
        if let Some(locale) = requested.and_then(|r| self.known(r)) {
            return locale;
        }
        if let Some(header) = accept_language {
            let mut tags: Vec<(&str, f32)> = header
                .split(',')
                .filter_map(|part| {
                    let mut pieces = part.split(';');
                    let tag = pieces.next()?.trim();
                    let q = pieces
                        .find_map(|p| p.trim().strip_prefix("q="))
                        .and_then(|q| q.parse::<f32>().ok())
                        .unwrap_or(1.0);
                    (tag != "*" && q > 0.0).then_some((tag, q))
                })
                .collect();
            tags.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            if let Some(locale) = tags.iter().find_map(|(tag, _)| self.known(tag)) {
                return locale;
            }
        }
        self.default_locale.clone()
    }

    pub fn messages(&self, locale: &str) -> Messages<'_> {
        Messages {
            locale: locale.to_string(),
            primary: self.locales.get(locale),
            fallback: self.locales.get(&self.default_locale),
        }
    }
}

/// Messages for one locale, falling back to the default locale.
#[derive(Clone, Debug)]
pub struct Messages<'a> {
    locale: String,
    primary: Option<&'a HashMap<String, String>>,
    fallback: Option<&'a HashMap<String, String>>,
}

impl<'a> Messages<'a> {
    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.primary
            .and_then(|m| m.get(key))
            .or_else(|| self.fallback.and_then(|m| m.get(key)))
            .map(String::as_str)
    }

    /// UI string with a built-in fallback.
    pub fn text(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn resource_label(&self, config: &ResourceConfig) -> String {
        self.get(&format!("model.{}.name", config.name))
            .map(str::to_string)
            .unwrap_or_else(|| config.name.clone())
    }

    /// Localized label, then the configured alias, then the raw name.
    pub fn field_label(&self, config: &ResourceConfig, field: &str) -> String {
        self.get(&format!("model.{}.fields.{}", config.name, field))
            .map(str::to_string)
            .or_else(|| config.aliases.get(field).cloned())
            .unwrap_or_else(|| field.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MessageCatalog {
        MessageCatalog::from_json(
            r#"{
                "en": { "model": { "Post": { "name": "Article", "fields": { "title": "Headline" } } },
                        "actions": { "create": "Create" } },
                "fr": { "model": { "Post": { "name": "Billet" } } }
            }"#,
            "en",
        )
        .unwrap()
    }

    #[test]
    fn nested_keys_flatten() {
        let c = catalog();
        let en = c.messages("en");
        assert_eq!(en.get("model.Post.fields.title"), Some("Headline"));
        let fr = c.messages("fr");
        assert_eq!(fr.get("model.Post.name"), Some("Billet"));
        // Falls back to the default locale.
        assert_eq!(fr.get("actions.create"), Some("Create"));
        assert_eq!(fr.text("actions.delete", "Delete"), "Delete");
    }

    #[test]
    fn locale_negotiation_order() {
        let c = catalog();
        assert_eq!(c.negotiate(Some("fr"), Some("en")), "fr");
        assert_eq!(c.negotiate(Some("de"), Some("de-DE, fr-CH;q=0.8, en;q=0.5")), "fr");
        assert_eq!(c.negotiate(None, Some("en;q=0.2, fr;q=0.9")), "fr");
        assert_eq!(c.negotiate(None, Some("ja")), "en");
        assert_eq!(c.negotiate(None, None), "en");
    }
}
