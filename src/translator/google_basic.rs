//! Google Cloud Translation (basic, v2) backend
//!
//! The API key is passed explicitly or loaded from the
//! `GOOGLE_TRANSLATE_API_KEY` environment variable. The supported language
//! catalog is fetched once when connecting.
//!
//! # Example
//!
//! ```ignore
//! use flex_chat::translator::{GoogleBasicTranslator, Locale, Translator};
//!
//! let provider = GoogleBasicTranslator::from_env(reqwest::Client::new()).await?;
//! let result = provider
//!     .translate("Hello, world!", &Locale::parse("en")?, &Locale::parse("fr")?)
//!     .await?;
//! ```

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::translator::error::{TranslatorError, TranslatorResult};
use crate::translator::http::check_status;
use crate::translator::translator::{
    LanguageCatalog, Locale, TranslatedText, Translator, merge_blanks, preflight, split_blanks,
};

const DEFAULT_BASE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

/// Google Translate API v2 backend
///
/// Supports both single and batch translations with automatic request chunking.
#[derive(Clone)]
pub struct GoogleBasicTranslator {
    /// API key for authentication
    api_key: String,
    /// Injected HTTP client
    client: reqwest::Client,
    /// Base URL for the v2 API
    base_url: String,
    /// Languages accepted by the API
    catalog: LanguageCatalog,
}

impl GoogleBasicTranslator {
    /// Maximum number of texts per API request
    const MAX_BATCH_SIZE: usize = 128;

    /// Maximum characters per string
    const MAX_CHARS_PER_STRING: usize = 30_000;

    /// Create a translator with a known catalog, without any network call.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the API key is empty.
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        catalog: LanguageCatalog,
    ) -> TranslatorResult<Self> {
        if api_key.trim().is_empty() {
            return Err(TranslatorError::ConfigError(
                "API key cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            catalog,
        })
    }

    /// Create a translator and fetch its language catalog.
    pub async fn connect(client: reqwest::Client, api_key: String) -> TranslatorResult<Self> {
        let mut translator = Self::new(client, api_key, LanguageCatalog::default())?;
        translator.catalog = translator.fetch_languages().await?;
        info!(
            "Google basic translator ready with {} languages",
            translator.catalog.len()
        );
        Ok(translator)
    }

    /// Connect using the `GOOGLE_TRANSLATE_API_KEY` environment variable.
    pub async fn from_env(client: reqwest::Client) -> TranslatorResult<Self> {
        let api_key = std::env::var("GOOGLE_TRANSLATE_API_KEY").map_err(|_| {
            TranslatorError::ConfigError(
                "GOOGLE_TRANSLATE_API_KEY environment variable not set".to_string(),
            )
        })?;

        Self::connect(client, api_key).await
    }

    /// Point the translator at another endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Chunk a batch of texts into API-safe sizes
    fn chunk_batch(texts: &[String]) -> Vec<&[String]> {
        texts.chunks(Self::MAX_BATCH_SIZE).collect()
    }

    async fn fetch_languages(&self) -> TranslatorResult<LanguageCatalog> {
        let url = format!("{}/languages?key={}", self.base_url, self.api_key);
        let response = self.client.get(&url).send().await?;
        let json: serde_json::Value = check_status(response, self.provider_name())
            .await?
            .json()
            .await?;

        let languages = json["data"]["languages"].as_array().ok_or_else(|| {
            TranslatorError::TranslationError(
                "Invalid API response: missing 'data.languages' array".to_string(),
            )
        })?;

        Ok(LanguageCatalog::from_tags(
            languages.iter().filter_map(|l| l["language"].as_str()),
        ))
    }

    /// Resolve both locales against the catalog. An auto-detected source
    /// resolves to `None`.
    fn resolve_pair(
        &self,
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<(Option<Locale>, Locale)> {
        let source = if source.is_auto() {
            None
        } else {
            Some(self.catalog.resolve(source)?)
        };
        Ok((source, self.catalog.resolve(target)?))
    }

    /// Translate a single chunk of texts via the API
    async fn translate_chunk(
        &self,
        texts: &[String],
        source: Option<&Locale>,
        target: &Locale,
    ) -> TranslatorResult<Vec<TranslatedText>> {
        let url = format!("{}?key={}", self.base_url, self.api_key);

        let mut body = json!({
            "q": texts,
            "target": target.to_string(),
            "format": "text"
        });
        if let Some(source) = source {
            body["source"] = json!(source.to_string());
        }

        let response = self.client.post(&url).json(&body).send().await?;
        let json: serde_json::Value = check_status(response, self.provider_name())
            .await?
            .json()
            .await?;

        parse_translations(&json, source)
    }
}

/// Read `data.translations`. Without a request source, each entry carries
/// the language the API detected.
fn parse_translations(
    json: &serde_json::Value,
    source: Option<&Locale>,
) -> TranslatorResult<Vec<TranslatedText>> {
    let translations = json["data"]["translations"].as_array().ok_or_else(|| {
        TranslatorError::TranslationError(
            "Invalid API response: missing 'data.translations' array".to_string(),
        )
    })?;

    translations
        .iter()
        .map(|t| {
            let text = t["translatedText"].as_str().ok_or_else(|| {
                TranslatorError::TranslationError(
                    "Invalid API response: missing 'translatedText' field".to_string(),
                )
            })?;
            let source = match source {
                Some(source) => source.clone(),
                None => {
                    let detected = t["detectedSourceLanguage"].as_str().ok_or_else(|| {
                        TranslatorError::TranslationError(
                            "Invalid API response: missing 'detectedSourceLanguage' field"
                                .to_string(),
                        )
                    })?;
                    Locale::parse(detected)?
                }
            };
            Ok(TranslatedText::new(text, source))
        })
        .collect()
}

impl std::fmt::Debug for GoogleBasicTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleBasicTranslator")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("languages", &self.catalog.len())
            .finish()
    }
}

#[async_trait]
impl Translator for GoogleBasicTranslator {
    async fn translate_detecting(
        &self,
        text: &str,
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<TranslatedText> {
        if let Some(result) = preflight(text, source, target) {
            return Ok(result);
        }

        if text.len() > Self::MAX_CHARS_PER_STRING {
            return Err(TranslatorError::TranslationError(format!(
                "Text exceeds maximum length of {} characters",
                Self::MAX_CHARS_PER_STRING
            )));
        }

        let (source, target) = self.resolve_pair(source, target)?;
        if let Some(source) = source.as_ref().filter(|s| s.language() == target.language()) {
            return Ok(TranslatedText::new(text, source.clone()));
        }

        let results = self
            .translate_chunk(&[text.to_string()], source.as_ref(), &target)
            .await?;

        results
            .into_iter()
            .next()
            .ok_or_else(|| TranslatorError::MissingResult(text.to_string()))
    }

    async fn translate_batch_detecting(
        &self,
        texts: &[String],
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<Vec<TranslatedText>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if source.is_router() || target.is_router() {
            return Ok(vec![TranslatedText::router(); texts.len()]);
        }

        for (i, text) in texts.iter().enumerate() {
            if text.len() > Self::MAX_CHARS_PER_STRING {
                return Err(TranslatorError::TranslationError(format!(
                    "Text at index {} exceeds maximum length of {} characters",
                    i,
                    Self::MAX_CHARS_PER_STRING
                )));
            }
        }

        let (slots, pending) = split_blanks(texts, source);
        if pending.is_empty() {
            return merge_blanks(slots, Vec::new());
        }

        let (source, target) = self.resolve_pair(source, target)?;
        if let Some(source) = source.as_ref().filter(|s| s.language() == target.language()) {
            return Ok(texts
                .iter()
                .map(|text| TranslatedText::new(text.as_str(), source.clone()))
                .collect());
        }

        let mut all_results = Vec::with_capacity(pending.len());
        for chunk in Self::chunk_batch(&pending) {
            let chunk_results = self
                .translate_chunk(chunk, source.as_ref(), &target)
                .await?;
            all_results.extend(chunk_results);
        }

        if all_results.len() < pending.len() {
            return Err(TranslatorError::MissingResult(
                pending[all_results.len()].clone(),
            ));
        }

        merge_blanks(slots, all_results)
    }

    fn provider_name(&self) -> &str {
        "Google Translate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleBasicTranslator {
        GoogleBasicTranslator::new(
            reqwest::Client::new(),
            "test-key".to_string(),
            LanguageCatalog::from_tags(["en", "fr", "zh-CN", "zh-TW"]),
        )
        .unwrap()
    }

    fn locale(tag: &str) -> Locale {
        Locale::parse(tag).unwrap()
    }

    #[test]
    fn test_new_with_empty_key() {
        let result = GoogleBasicTranslator::new(
            reqwest::Client::new(),
            "   ".to_string(),
            LanguageCatalog::default(),
        );
        match result {
            Err(TranslatorError::ConfigError(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected ConfigError"),
        }
    }

    #[test]
    fn test_chunk_over_limit() {
        let texts = (0..200).map(|i| format!("text{}", i)).collect::<Vec<_>>();
        let chunks = GoogleBasicTranslator::chunk_batch(&texts);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 128);
        assert_eq!(chunks[1].len(), 72);
    }

    #[test]
    fn test_resolve_pair_prefers_region() {
        let (source, target) = provider()
            .resolve_pair(&locale("en-US"), &locale("zh-TW"))
            .unwrap();
        assert_eq!(source, Some(locale("en")));
        assert_eq!(target, locale("zh-TW"));
    }

    #[test]
    fn test_resolve_pair_auto_source() {
        let (source, _) = provider()
            .resolve_pair(&Locale::auto(), &locale("fr"))
            .unwrap();
        assert_eq!(source, None);
    }

    #[tokio::test]
    async fn test_translate_unsupported_language() {
        let result = provider()
            .translate("hello", &locale("en"), &locale("de"))
            .await;
        assert_eq!(
            result,
            Err(TranslatorError::UnsupportedLanguage("de".to_string()))
        );
    }

    #[tokio::test]
    async fn test_translate_shortcuts_without_network() {
        let provider = provider();
        assert_eq!(
            provider
                .translate("", &locale("en"), &locale("fr"))
                .await
                .unwrap(),
            ""
        );
        assert_eq!(
            provider
                .translate("hello", &Locale::router(), &locale("fr"))
                .await
                .unwrap(),
            "router"
        );
        assert_eq!(
            provider
                .translate("hello", &locale("fr-CA"), &locale("fr"))
                .await
                .unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn test_translate_text_too_long() {
        let long_text = "x".repeat(GoogleBasicTranslator::MAX_CHARS_PER_STRING + 1);
        let result = provider()
            .translate(&long_text, &locale("en"), &locale("fr"))
            .await;
        match result {
            Err(TranslatorError::TranslationError(msg)) => assert!(msg.contains("exceeds maximum")),
            _ => panic!("Expected TranslationError"),
        }
    }

    #[tokio::test]
    async fn test_batch_router() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let results = provider()
            .translate_batch(&texts, &locale("en"), &Locale::router())
            .await
            .unwrap();
        assert_eq!(results, vec!["router", "router"]);
    }

    #[tokio::test]
    async fn test_batch_blank_entries_skip_network() {
        // Nothing listens there, so any request would fail
        let provider = provider().with_base_url("http://127.0.0.1:9");
        let texts = vec!["".to_string(), "   ".to_string()];
        let results = provider
            .translate_batch(&texts, &locale("en"), &locale("fr"))
            .await
            .unwrap();
        assert_eq!(results, texts);
    }

    #[test]
    fn test_parse_detected_source() {
        let json = json!({
            "data": {
                "translations": [
                    {"translatedText": "Bonjour", "detectedSourceLanguage": "en"},
                    {"translatedText": "Salut", "detectedSourceLanguage": "de"}
                ]
            }
        });
        let results = parse_translations(&json, None).unwrap();
        assert_eq!(
            results,
            vec![
                TranslatedText::new("Bonjour", locale("en")),
                TranslatedText::new("Salut", locale("de")),
            ]
        );

        let fixed = parse_translations(&json, Some(&locale("it"))).unwrap();
        assert!(fixed.iter().all(|t| t.source == locale("it")));
    }

    #[test]
    fn test_parse_missing_detection() {
        let json = json!({"data": {"translations": [{"translatedText": "Bonjour"}]}});
        assert!(matches!(
            parse_translations(&json, None),
            Err(TranslatorError::TranslationError(_))
        ));
    }

    #[test]
    fn test_debug_output() {
        let debug_str = format!("{:?}", provider());
        assert!(debug_str.contains("***"));
        assert!(!debug_str.contains("test-key"));
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --ignored
    async fn test_real_api_single_translation() {
        if std::env::var("GOOGLE_TRANSLATE_API_KEY").is_err() {
            eprintln!("Skipping: GOOGLE_TRANSLATE_API_KEY not set");
            return;
        }

        let provider = GoogleBasicTranslator::from_env(reqwest::Client::new())
            .await
            .unwrap();
        let result = provider
            .translate("Hello", &locale("en"), &locale("fr"))
            .await
            .unwrap();
        assert!(!result.is_empty());
    }
}
