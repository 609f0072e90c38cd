//! LibreTranslate backend
//!
//! Talks to any LibreTranslate instance. The instance publishes, per source
//! language, the set of target languages it can produce.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::translator::error::{TranslatorError, TranslatorResult};
use crate::translator::http::check_status;
use crate::translator::translator::{AUTO_DETECT, Locale, TranslatedText, Translator, preflight};

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    code: String,
    #[serde(default)]
    targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
    #[serde(rename = "detectedLanguage", default)]
    detected_language: Option<DetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    language: String,
}

impl TranslateResponse {
    /// Pair the text with the detected language when the request asked for
    /// detection, otherwise with the request source.
    fn into_translated(self, source: &Locale) -> TranslatorResult<TranslatedText> {
        let source = match (source.is_auto(), self.detected_language) {
            (true, Some(detected)) => Locale::parse(&detected.language)?,
            _ => source.clone(),
        };
        Ok(TranslatedText::new(self.translated_text, source))
    }
}

#[derive(Clone)]
pub struct LibreTranslateTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    /// Source language code to the codes it translates into
    languages: HashMap<String, HashSet<String>>,
}

impl LibreTranslateTranslator {
    /// Create a translator from a known language table, without any network call.
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        languages: HashMap<String, HashSet<String>>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            languages,
        }
    }

    /// Create a translator and fetch the language table of the instance.
    pub async fn connect(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> TranslatorResult<Self> {
        let mut translator = Self::new(client, endpoint, api_key, HashMap::new());
        let response = translator
            .client
            .get(format!("{}/languages", translator.endpoint))
            .header("Accept", "application/json")
            .send()
            .await?;
        let entries: Vec<LanguageEntry> = check_status(response, translator.provider_name())
            .await?
            .json()
            .await?;

        translator.languages = language_table(entries);
        info!(
            "LibreTranslate at {} ready with {} languages",
            translator.endpoint,
            translator.languages.len().saturating_sub(1)
        );
        Ok(translator)
    }

    fn source_code(source: &Locale) -> &str {
        if source.is_auto() {
            AUTO_DETECT
        } else {
            source.language()
        }
    }

    fn check_supported(&self, source: &Locale, target: &Locale) -> TranslatorResult<()> {
        let targets = self
            .languages
            .get(Self::source_code(source))
            .ok_or_else(|| TranslatorError::UnsupportedLanguage(source.to_string()))?;
        if targets.contains(target.language()) {
            Ok(())
        } else {
            Err(TranslatorError::UnsupportedLanguage(target.to_string()))
        }
    }
}

/// Build the lookup table. Instances that omit `targets` for a code are
/// assumed to translate it into every listed language, and the detection
/// pseudo-source maps to all of them.
fn language_table(entries: Vec<LanguageEntry>) -> HashMap<String, HashSet<String>> {
    let all: HashSet<String> = entries.iter().map(|e| e.code.clone()).collect();
    let mut table: HashMap<String, HashSet<String>> = entries
        .into_iter()
        .map(|entry| {
            let targets = if entry.targets.is_empty() {
                all.clone()
            } else {
                entry.targets.into_iter().collect()
            };
            (entry.code, targets)
        })
        .collect();
    table.insert(AUTO_DETECT.to_string(), all);
    table
}

impl std::fmt::Debug for LibreTranslateTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibreTranslateTranslator")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("languages", &self.languages.len())
            .finish()
    }
}

#[async_trait]
impl Translator for LibreTranslateTranslator {
    async fn translate_detecting(
        &self,
        text: &str,
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<TranslatedText> {
        if let Some(result) = preflight(text, source, target) {
            return Ok(result);
        }
        self.check_supported(source, target)?;

        let mut body = json!({
            "q": text,
            "source": Self::source_code(source),
            "target": target.language(),
            "format": "text"
        });
        if let Some(api_key) = &self.api_key {
            body["api_key"] = json!(api_key);
        }

        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let result: TranslateResponse = check_status(response, self.provider_name())
            .await?
            .json()
            .await?;

        result.into_translated(source)
    }

    fn provider_name(&self) -> &str {
        "LibreTranslate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, targets: &[&str]) -> LanguageEntry {
        LanguageEntry {
            code: code.to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn translator() -> LibreTranslateTranslator {
        LibreTranslateTranslator::new(
            reqwest::Client::new(),
            "http://localhost:5000/",
            None,
            language_table(vec![entry("en", &["fr"]), entry("fr", &["en"]), entry("de", &[])]),
        )
    }

    fn locale(tag: &str) -> Locale {
        Locale::parse(tag).unwrap()
    }

    #[test]
    fn test_language_table_fills_missing_targets() {
        let table = language_table(vec![entry("en", &["fr"]), entry("fr", &[]), entry("de", &[])]);
        assert_eq!(table["en"].len(), 1);
        assert_eq!(table["fr"].len(), 3);
        assert_eq!(table[AUTO_DETECT].len(), 3);
    }

    #[test]
    fn test_languages_response_decodes() {
        let entries: Vec<LanguageEntry> = serde_json::from_str(
            r#"[{"code":"en","name":"English","targets":["fr"]},{"code":"fr","name":"French"}]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].targets.is_empty());
    }

    #[test]
    fn test_check_supported() {
        let translator = translator();
        assert!(translator.check_supported(&locale("en-US"), &locale("fr")).is_ok());
        assert!(translator.check_supported(&Locale::auto(), &locale("de")).is_ok());
        assert_eq!(
            translator.check_supported(&locale("ja"), &locale("en")),
            Err(TranslatorError::UnsupportedLanguage("ja".to_string()))
        );
        assert_eq!(
            translator.check_supported(&locale("en"), &locale("de")),
            Err(TranslatorError::UnsupportedLanguage("de".to_string()))
        );
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        assert_eq!(translator().endpoint, "http://localhost:5000");
    }

    #[tokio::test]
    async fn test_unsupported_target_fails_before_request() {
        let result = translator()
            .translate("hello", &locale("en"), &locale("de"))
            .await;
        assert_eq!(
            result,
            Err(TranslatorError::UnsupportedLanguage("de".to_string()))
        );
    }

    #[test]
    fn test_detected_language_reported_for_auto() {
        let response = || -> TranslateResponse {
            serde_json::from_str(
                r#"{"detectedLanguage": {"confidence": 90.0, "language": "fr"}, "translatedText": "Hello"}"#,
            )
            .unwrap()
        };
        assert_eq!(
            response().into_translated(&Locale::auto()).unwrap(),
            TranslatedText::new("Hello", locale("fr"))
        );
        assert_eq!(
            response().into_translated(&locale("de")).unwrap().source,
            locale("de")
        );

        let plain: TranslateResponse = serde_json::from_str(r#"{"translatedText": "Hello"}"#).unwrap();
        assert_eq!(plain.into_translated(&Locale::auto()).unwrap().source, Locale::auto());
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --ignored
    async fn test_real_instance() {
        let Ok(endpoint) = std::env::var("LIBRE_TRANSLATE_ENDPOINT") else {
            eprintln!("Skipping: LIBRE_TRANSLATE_ENDPOINT not set");
            return;
        };

        let translator = LibreTranslateTranslator::connect(reqwest::Client::new(), endpoint, None)
            .await
            .unwrap();
        let result = translator
            .translate("Hello", &locale("en"), &locale("fr"))
            .await
            .unwrap();
        assert!(!result.is_empty());
    }
}
