//! Translator trait and locale utilities
//!
//! This module defines the `Translator` trait for backend abstraction, along
//! with the `Locale` and `TranslationKey` types every backend and decorator
//! agrees on.
//!
//! # Example
//!
//! ```ignore
//! use flex_chat::translator::{Locale, Translator, GoogleBasicTranslator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = GoogleBasicTranslator::connect(reqwest::Client::new(), api_key).await?;
//!     let en = Locale::parse("en")?;
//!     let fr = Locale::parse("fr")?;
//!     println!("{}", provider.translate("Hello, world!", &en, &fr).await?);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use icu_locale::LanguageIdentifier;
use tracing::debug;

use crate::translator::error::{TranslatorError, TranslatorResult};

/// Text returned for any request routed through the `router` pseudo-locale.
pub const ROUTER_MARKER: &str = "router";

/// Code of the auto-detection pseudo-locale.
pub const AUTO_DETECT: &str = "auto";

/// A translation locale.
///
/// Besides real BCP 47 languages there are two sentinels: [`Locale::Router`]
/// marks messages that are only being routed and must not be translated,
/// [`Locale::Auto`] asks the backend to detect the source language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locale {
    Router,
    Auto,
    Language(LanguageIdentifier),
}

impl Locale {
    /// Parse a locale tag. Underscores are accepted as separators (`en_US`).
    ///
    /// `router` and `auto` (or `und`) yield the sentinels.
    pub fn parse(tag: &str) -> TranslatorResult<Self> {
        let tag = tag.trim();
        if tag.eq_ignore_ascii_case(ROUTER_MARKER) {
            return Ok(Locale::Router);
        }
        if tag.eq_ignore_ascii_case(AUTO_DETECT) {
            return Ok(Locale::Auto);
        }

        let id = tag
            .replace('_', "-")
            .parse::<LanguageIdentifier>()
            .map_err(|e| TranslatorError::InvalidLocale(format!("{}: {}", tag, e)))?;
        if id.language.as_str() == "und" {
            Ok(Locale::Auto)
        } else {
            Ok(Locale::Language(id))
        }
    }

    pub fn router() -> Self {
        Locale::Router
    }

    pub fn auto() -> Self {
        Locale::Auto
    }

    /// The language subtag, or the sentinel code.
    pub fn language(&self) -> &str {
        match self {
            Locale::Router => ROUTER_MARKER,
            Locale::Auto => AUTO_DETECT,
            Locale::Language(id) => id.language.as_str(),
        }
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            Locale::Language(id) => id.region.as_ref().map(|region| region.as_str()),
            _ => None,
        }
    }

    /// The locale reduced to its language subtag: `en-US` → `en`.
    /// Sentinels are their own base.
    pub fn base(&self) -> Locale {
        match self {
            Locale::Language(id) => Locale::Language(LanguageIdentifier::from(id.language)),
            sentinel => sentinel.clone(),
        }
    }

    pub fn is_router(&self) -> bool {
        matches!(self, Locale::Router)
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Locale::Auto)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::Language(id) => write!(f, "{}", id),
            sentinel => f.write_str(sentinel.language()),
        }
    }
}

impl FromStr for Locale {
    type Err = TranslatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::parse(s)
    }
}

/// Cache identity of a translation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationKey {
    pub text: String,
    pub source: Locale,
    pub target: Locale,
}

impl TranslationKey {
    pub fn new(text: impl Into<String>, source: Locale, target: Locale) -> Self {
        Self {
            text: text.into(),
            source,
            target,
        }
    }

    /// Build a key with both locales reduced to their base language, so that
    /// `en-US → fr-FR` and `en → fr` share an entry.
    pub fn normalized(text: impl Into<String>, source: &Locale, target: &Locale) -> Self {
        Self::new(text, source.base(), target.base())
    }
}

/// A translation along with the language it was translated from.
///
/// `source` is the detected language when the request asked for
/// [`Locale::Auto`], the resolved request source otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedText {
    pub text: String,
    pub source: Locale,
}

impl TranslatedText {
    pub fn new(text: impl Into<String>, source: Locale) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }

    /// The answer to any request involving [`Locale::Router`].
    pub fn router() -> Self {
        Self::new(ROUTER_MARKER, Locale::Router)
    }
}

/// Outcome of a single translation as stored by caches.
pub type TranslationResult = TranslatorResult<TranslatedText>;

/// Generic trait for translation backends and decorators
///
/// All methods are async to support I/O-bound operations like network requests.
/// Implementors provide the detecting variants; [`Translator::translate`] and
/// [`Translator::translate_batch`] drop the source language.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a single text from `source` to `target`.
    ///
    /// Backends honour the shared contract implemented by [`preflight`]:
    /// blank text and same-language requests are identity, and the `router`
    /// pseudo-locale short-circuits to [`ROUTER_MARKER`].
    async fn translate_detecting(
        &self,
        text: &str,
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<TranslatedText>;

    /// Translate several texts sharing the same locale pair.
    ///
    /// # Guarantees
    ///
    /// - Output order matches input order
    /// - A single failure fails the whole batch
    async fn translate_batch_detecting(
        &self,
        texts: &[String],
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<Vec<TranslatedText>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.translate_detecting(text, source, target).await?);
        }
        Ok(results)
    }

    async fn translate(
        &self,
        text: &str,
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<String> {
        Ok(self.translate_detecting(text, source, target).await?.text)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<Vec<String>> {
        Ok(self
            .translate_batch_detecting(texts, source, target)
            .await?
            .into_iter()
            .map(|translated| translated.text)
            .collect())
    }

    /// Name used in logs.
    fn provider_name(&self) -> &str;
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    async fn translate_detecting(
        &self,
        text: &str,
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<TranslatedText> {
        (**self).translate_detecting(text, source, target).await
    }

    async fn translate_batch_detecting(
        &self,
        texts: &[String],
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<Vec<TranslatedText>> {
        (**self).translate_batch_detecting(texts, source, target).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}

/// Translator that supports nothing. Used as the default fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate_detecting(
        &self,
        _text: &str,
        _source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<TranslatedText> {
        Err(TranslatorError::UnsupportedLanguage(target.to_string()))
    }

    fn provider_name(&self) -> &str {
        "None"
    }
}

/// Answer the requests every backend resolves without a network call.
///
/// Returns `Some(result)` for blank text, for the `router` pseudo-locale and
/// for same-language pairs; `None` when the backend must do the work.
pub fn preflight(text: &str, source: &Locale, target: &Locale) -> Option<TranslatedText> {
    if source.is_router() || target.is_router() {
        Some(TranslatedText::router())
    } else if text.trim().is_empty() || source.language() == target.language() {
        Some(TranslatedText::new(text, source.clone()))
    } else {
        None
    }
}

/// Answer the blank entries of a batch locally.
///
/// Returns the slots to fill, with blank texts already answered, and the
/// texts that still need a backend call in input order.
pub(crate) fn split_blanks(
    texts: &[String],
    source: &Locale,
) -> (Vec<Option<TranslatedText>>, Vec<String>) {
    let mut slots = Vec::with_capacity(texts.len());
    let mut pending = Vec::new();
    for text in texts {
        if text.trim().is_empty() {
            slots.push(Some(TranslatedText::new(text.as_str(), source.clone())));
        } else {
            slots.push(None);
            pending.push(text.clone());
        }
    }
    (slots, pending)
}

/// Fill the empty slots left by [`split_blanks`] with backend results.
pub(crate) fn merge_blanks(
    slots: Vec<Option<TranslatedText>>,
    translated: Vec<TranslatedText>,
) -> TranslatorResult<Vec<TranslatedText>> {
    let mut translated = translated.into_iter();
    slots
        .into_iter()
        .map(|slot| match slot {
            Some(done) => Ok(done),
            None => translated.next().ok_or_else(|| {
                TranslatorError::MissingResult("batch response is too short".to_string())
            }),
        })
        .collect()
}

/// Languages a backend accepts on one side of a translation.
#[derive(Debug, Clone, Default)]
pub struct LanguageCatalog {
    languages: Vec<Locale>,
}

impl LanguageCatalog {
    pub fn new(languages: Vec<Locale>) -> Self {
        Self { languages }
    }

    /// Build a catalog from raw backend codes, skipping unparsable ones.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let languages = tags
            .into_iter()
            .filter_map(|tag| match Locale::parse(tag.as_ref()) {
                Ok(locale) => Some(locale),
                Err(e) => {
                    debug!("Skipping catalog entry: {}", e);
                    None
                }
            })
            .collect();
        Self { languages }
    }

    /// Find the catalog entry closest to `locale`.
    ///
    /// The language must match exactly. When several regional variants
    /// exist, the one with the requested region wins, else the first one.
    pub fn resolve(&self, locale: &Locale) -> TranslatorResult<Locale> {
        if !matches!(locale, Locale::Language(_)) {
            return Err(TranslatorError::UnsupportedLanguage(locale.to_string()));
        }
        let candidates: Vec<&Locale> = self
            .languages
            .iter()
            .filter(|candidate| candidate.language() == locale.language())
            .collect();
        match candidates.as_slice() {
            [] => Err(TranslatorError::UnsupportedLanguage(locale.to_string())),
            [only] => Ok((*only).clone()),
            [first, ..] => {
                let preferred = candidates
                    .iter()
                    .copied()
                    .find(|candidate| candidate.region() == locale.region())
                    .unwrap_or(*first);
                Ok(preferred.clone())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale(tag: &str) -> Locale {
        Locale::parse(tag).unwrap()
    }

    #[test]
    fn test_parse_normalizes_case_and_separator() {
        assert_eq!(locale("EN_us").to_string(), "en-US");
        assert_eq!(locale("fr").region(), None);
        assert_eq!(locale("pt-BR").region(), Some("BR"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Locale::parse("not a locale!"),
            Err(TranslatorError::InvalidLocale(_))
        ));
    }

    #[test]
    fn test_base_strips_region_and_script() {
        assert_eq!(locale("en-US").base(), locale("en"));
        assert_eq!(locale("zh-Hans-CN").base(), locale("zh"));
    }

    #[test]
    fn test_sentinels() {
        assert!(Locale::router().is_router());
        assert!(Locale::auto().is_auto());
        assert!(!locale("en").is_router());
        assert_eq!(locale("router"), Locale::Router);
        assert_eq!(locale("ROUTER"), Locale::Router);
        assert_eq!(locale("auto"), Locale::Auto);
        assert_eq!(locale("und"), Locale::Auto);
        assert_eq!(Locale::Router.to_string(), "router");
        assert_eq!(Locale::Auto.to_string(), "auto");
        assert_eq!(Locale::Router.base(), Locale::Router);
        assert_eq!(Locale::Auto.region(), None);
    }

    #[test]
    fn test_normalized_key_equality() {
        let a = TranslationKey::normalized("hi", &locale("en-US"), &locale("fr-FR"));
        let b = TranslationKey::normalized("hi", &locale("en"), &locale("fr-CA"));
        assert_eq!(a, b);
        assert_ne!(a, TranslationKey::normalized("hi", &locale("en"), &locale("de")));
    }

    #[test]
    fn test_preflight_blank_text() {
        assert_eq!(
            preflight("   ", &locale("en"), &locale("fr")),
            Some(TranslatedText::new("   ", locale("en")))
        );
    }

    #[test]
    fn test_preflight_router() {
        assert_eq!(
            preflight("hello", &Locale::router(), &locale("fr")),
            Some(TranslatedText::router())
        );
        assert_eq!(
            preflight("hello", &locale("en"), &Locale::router()).map(|t| t.text),
            Some("router".to_string())
        );
        assert_eq!(
            preflight("   ", &locale("en"), &Locale::router()),
            Some(TranslatedText::router())
        );
    }

    #[test]
    fn test_preflight_same_language() {
        assert_eq!(
            preflight("colour", &locale("en-GB"), &locale("en-US")),
            Some(TranslatedText::new("colour", locale("en-GB")))
        );
        assert_eq!(preflight("hello", &locale("en"), &locale("fr")), None);
    }

    #[test]
    fn test_catalog_exact_language_required() {
        let catalog = LanguageCatalog::from_tags(["en", "fr"]);
        assert!(matches!(
            catalog.resolve(&locale("de")),
            Err(TranslatorError::UnsupportedLanguage(_))
        ));
        assert_eq!(catalog.resolve(&locale("fr-CA")).unwrap(), locale("fr"));
    }

    #[test]
    fn test_catalog_prefers_matching_region() {
        let catalog = LanguageCatalog::from_tags(["en-GB", "en-US", "pt-PT", "pt-BR"]);
        assert_eq!(catalog.resolve(&locale("en-US")).unwrap(), locale("en-US"));
        assert_eq!(catalog.resolve(&locale("pt-BR")).unwrap(), locale("pt-BR"));
        // No region match falls back to the first candidate
        assert_eq!(catalog.resolve(&locale("en-AU")).unwrap(), locale("en-GB"));
        assert_eq!(catalog.resolve(&locale("pt")).unwrap(), locale("pt-PT"));
    }

    #[test]
    fn test_catalog_rejects_sentinels() {
        let catalog = LanguageCatalog::from_tags(["en", "fr"]);
        assert!(catalog.resolve(&Locale::Auto).is_err());
        assert!(catalog.resolve(&Locale::Router).is_err());
    }

    #[test]
    fn test_blank_batch_entries_answered_locally() {
        let texts = vec!["a".to_string(), "  ".to_string(), "b".to_string()];
        let (slots, pending) = split_blanks(&texts, &locale("en"));
        assert_eq!(pending, vec!["a", "b"]);

        let merged = merge_blanks(
            slots,
            vec![
                TranslatedText::new("A", locale("en")),
                TranslatedText::new("B", locale("en")),
            ],
        )
        .unwrap();
        let texts: Vec<_> = merged.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "  ", "B"]);
    }

    #[test]
    fn test_catalog_skips_invalid_tags() {
        let catalog = LanguageCatalog::from_tags(["en", "???", "fr"]);
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn test_noop_translator_fails() {
        let result = NoopTranslator
            .translate("hello", &locale("en"), &locale("fr"))
            .await;
        assert_eq!(
            result,
            Err(TranslatorError::UnsupportedLanguage("fr".to_string()))
        );
    }
}
