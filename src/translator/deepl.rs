//! DeepL backend
//!
//! Uses the DeepL REST API v2. Free-tier keys (suffix `:fx`) are routed to the
//! free endpoint automatically. Source and target catalogs are fetched
//! separately since DeepL distinguishes regional variants only on the target
//! side.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::translator::error::{TranslatorError, TranslatorResult};
use crate::translator::http::check_status;
use crate::translator::translator::{
    LanguageCatalog, Locale, TranslatedText, Translator, merge_blanks, preflight, split_blanks,
};

const PRO_BASE_URL: &str = "https://api.deepl.com/v2";
const FREE_BASE_URL: &str = "https://api-free.deepl.com/v2";

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    language: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    character_count: Option<u64>,
    character_limit: Option<u64>,
}

impl Usage {
    fn limit_reached(&self) -> bool {
        matches!(
            (self.character_count, self.character_limit),
            (Some(count), Some(limit)) if count >= limit
        )
    }
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
    #[serde(default)]
    detected_source_language: Option<String>,
}

impl Translation {
    /// Pair the text with the request source, or with the detected language
    /// when the source was left to DeepL.
    fn into_translated(self, source: Option<&Locale>) -> TranslatorResult<TranslatedText> {
        let source = match (source, self.detected_source_language) {
            (Some(source), _) => source.clone(),
            (None, Some(detected)) => Locale::parse(&detected)?,
            (None, None) => {
                return Err(TranslatorError::TranslationError(
                    "Invalid API response: missing 'detected_source_language' field".to_string(),
                ));
            }
        };
        Ok(TranslatedText::new(self.text, source))
    }
}

#[derive(Clone)]
pub struct DeepLTranslator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    sources: LanguageCatalog,
    targets: LanguageCatalog,
}

impl DeepLTranslator {
    /// Create a translator with known catalogs, without any network call.
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        sources: LanguageCatalog,
        targets: LanguageCatalog,
    ) -> TranslatorResult<Self> {
        if api_key.trim().is_empty() {
            return Err(TranslatorError::ConfigError(
                "API key cannot be empty".to_string(),
            ));
        }

        let base_url = if api_key.ends_with(":fx") {
            FREE_BASE_URL
        } else {
            PRO_BASE_URL
        };

        Ok(Self {
            client,
            api_key,
            base_url: base_url.to_string(),
            sources,
            targets,
        })
    }

    /// Create a translator and fetch both language catalogs.
    pub async fn connect(client: reqwest::Client, api_key: String) -> TranslatorResult<Self> {
        let mut translator = Self::new(
            client,
            api_key,
            LanguageCatalog::default(),
            LanguageCatalog::default(),
        )?;
        translator.sources = translator.fetch_languages("source").await?;
        translator.targets = translator.fetch_languages("target").await?;
        info!(
            "DeepL translator ready with {} source and {} target languages",
            translator.sources.len(),
            translator.targets.len()
        );
        Ok(translator)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn authorization(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }

    async fn fetch_languages(&self, kind: &str) -> TranslatorResult<LanguageCatalog> {
        let response = self
            .client
            .get(format!("{}/languages?type={}", self.base_url, kind))
            .header("Authorization", self.authorization())
            .send()
            .await?;
        let entries: Vec<LanguageEntry> = check_status(response, self.provider_name())
            .await?
            .json()
            .await?;
        Ok(LanguageCatalog::from_tags(
            entries.iter().map(|entry| entry.language.as_str()),
        ))
    }

    async fn usage(&self) -> TranslatorResult<Usage> {
        let response = self
            .client
            .get(format!("{}/usage", self.base_url))
            .header("Authorization", self.authorization())
            .send()
            .await?;
        Ok(check_status(response, self.provider_name())
            .await?
            .json()
            .await?)
    }

    async fn request(
        &self,
        texts: &[String],
        source: Option<&Locale>,
        target: &Locale,
    ) -> TranslatorResult<Vec<TranslatedText>> {
        if self.usage().await?.limit_reached() {
            return Err(TranslatorError::RateLimited);
        }

        let mut body = json!({
            "text": texts,
            "target_lang": target.to_string().to_uppercase(),
            "formality": "prefer_less"
        });
        if let Some(source) = source {
            body["source_lang"] = json!(source.language().to_uppercase());
        }

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .header("Authorization", self.authorization())
            .json(&body)
            .send()
            .await?;
        let result: TranslateResponse = check_status(response, self.provider_name())
            .await?
            .json()
            .await?;

        if result.translations.len() < texts.len() {
            return Err(TranslatorError::MissingResult(
                texts[result.translations.len()].clone(),
            ));
        }
        result
            .translations
            .into_iter()
            .map(|translation| translation.into_translated(source))
            .collect()
    }

    fn resolve_pair(
        &self,
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<(Option<Locale>, Locale)> {
        let source = if source.is_auto() {
            None
        } else {
            Some(self.sources.resolve(source)?)
        };
        Ok((source, self.targets.resolve(target)?))
    }
}

impl std::fmt::Debug for DeepLTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepLTranslator")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("sources", &self.sources.len())
            .field("targets", &self.targets.len())
            .finish()
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    async fn translate_detecting(
        &self,
        text: &str,
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<TranslatedText> {
        if let Some(result) = preflight(text, source, target) {
            return Ok(result);
        }
        let mut results = self
            .translate_batch_detecting(&[text.to_string()], source, target)
            .await?;
        results
            .pop()
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

        let translated = self.request(&pending, source.as_ref(), &target).await?;
        merge_blanks(slots, translated)
    }

    fn provider_name(&self) -> &str {
        "DeepL"
    }
}
