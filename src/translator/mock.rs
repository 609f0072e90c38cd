//! Mock translator for testing
//!
//! A deterministic, API-free translator for exercising decorators and
//! message processors without network access. It records how many requests
//! succeeded and failed so tests can assert on backend traffic.
//!
//! # Example
//!
//! ```ignore
//! use flex_chat::translator::{Locale, MockMode, MockTranslator, Translator};
//!
//! let mock = MockTranslator::new(MockMode::Suffix);
//! let result = mock.translate("hello", &Locale::parse("en")?, &Locale::parse("fr")?).await?;
//! assert_eq!(result, "hello_fr");
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use icu_locale::langid;

use crate::translator::error::{TranslatorError, TranslatorResult};
use crate::translator::translator::{Locale, TranslatedText, TranslationResult, Translator};

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the target language: "hello" → "hello_fr"
    Suffix,

    /// Predefined translations keyed by (text, target language), falling
    /// back to `Suffix` for unknown pairs
    Mappings(HashMap<(String, String), String>),

    /// Fail every request with the given error
    Error(TranslatorError),

    /// Return input unchanged
    NoOp,

    /// Panic inside the request, like a backend with a bug. Counted as a
    /// failure before unwinding.
    Panic,
}

/// Mock translator that simulates various translation scenarios
#[derive(Debug)]
pub struct MockTranslator {
    mode: MockMode,
    /// Per-pair outcomes that take precedence over the mode
    results: HashMap<(String, String), TranslatorResult<String>>,
    /// Texts silently dropped from batch responses
    omitted: HashSet<String>,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    successes: AtomicUsize,
    failures: AtomicUsize,
    batches: AtomicUsize,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            results: HashMap::new(),
            omitted: HashSet::new(),
            delay_ms: 0,
            successes: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
        }
    }

    /// Create a MockTranslator with simulated network delay
    ///
    /// The delay uses the tokio clock, so paused-time tests can advance past it.
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Fix the outcome of translating `text` into `target`.
    pub fn with_result(mut self, text: &str, target: &str, result: TranslatorResult<String>) -> Self {
        self.results
            .insert((text.to_string(), target.to_string()), result);
        self
    }

    /// Leave `text` out of batch responses.
    pub fn omitting(mut self, text: &str) -> Self {
        self.omitted.insert(text.to_string());
        self
    }

    /// Number of texts translated successfully.
    pub fn success_count(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    /// Number of texts that failed.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Number of `translate_batch` calls received.
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    /// Detection always reports English.
    fn detected_source(source: &Locale) -> Locale {
        if source.is_auto() {
            Locale::Language(langid!("en"))
        } else {
            source.clone()
        }
    }

    fn apply_translation(&self, text: &str, source: &Locale, target: &Locale) -> TranslationResult {
        self.apply_text(text, target)
            .map(|translated| TranslatedText::new(translated, Self::detected_source(source)))
    }

    fn apply_text(&self, text: &str, target: &Locale) -> TranslatorResult<String> {
        let key = (text.to_string(), target.language().to_string());
        if let Some(result) = self.results.get(&key) {
            return result.clone();
        }

        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target.language())),
            MockMode::Mappings(map) => Ok(map
                .get(&key)
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", text, target.language()))),
            MockMode::Error(error) => Err(error.clone()),
            MockMode::NoOp => Ok(text.to_string()),
            MockMode::Panic => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                panic!("mock translator failed on {:?}", text)
            }
        }
    }

    fn record(&self, result: TranslationResult) -> TranslationResult {
        match &result {
            Ok(_) => self.successes.fetch_add(1, Ordering::SeqCst),
            Err(_) => self.failures.fetch_add(1, Ordering::SeqCst),
        };
        result
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate_detecting(
        &self,
        text: &str,
        source: &Locale,
        target: &Locale,
    ) -> TranslationResult {
        self.apply_delay().await;
        self.record(self.apply_translation(text, source, target))
    }

    async fn translate_batch_detecting(
        &self,
        texts: &[String],
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<Vec<TranslatedText>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        // Per batch, not per string
        self.apply_delay().await;

        let mut results = Vec::with_capacity(texts.len());
        for text in texts.iter().filter(|text| !self.omitted.contains(*text)) {
            results.push(self.record(self.apply_translation(text, source, target))?);
        }
        Ok(results)
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale(tag: &str) -> Locale {
        Locale::parse(tag).unwrap()
    }

    #[tokio::test]
    async fn test_suffix_single_translation() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let result = mock
            .translate("hello", &locale("en"), &locale("fr-CA"))
            .await
            .unwrap();
        assert_eq!(result, "hello_fr");
        assert_eq!(mock.success_count(), 1);
    }

    #[tokio::test]
    async fn test_mapping_fallback_to_suffix() {
        let mut map = HashMap::new();
        map.insert(
            ("hello".to_string(), "fr".to_string()),
            "bonjour".to_string(),
        );

        let mock = MockTranslator::new(MockMode::Mappings(map));
        let texts = vec!["hello".to_string(), "unknown".to_string()];
        let results = mock
            .translate_batch(&texts, &locale("en"), &locale("fr"))
            .await
            .unwrap();
        assert_eq!(results, vec!["bonjour", "unknown_fr"]);
    }

    #[tokio::test]
    async fn test_error_mode_counts_failures() {
        let mock = MockTranslator::new(MockMode::Error(TranslatorError::RateLimited));
        let result = mock.translate("hello", &locale("en"), &locale("fr")).await;
        assert_eq!(result, Err(TranslatorError::RateLimited));
        assert_eq!(mock.failure_count(), 1);
        assert_eq!(mock.success_count(), 0);
    }

    #[tokio::test]
    async fn test_fixed_result_overrides_mode() {
        let mock = MockTranslator::new(MockMode::NoOp).with_result(
            "hello",
            "zh",
            Err(TranslatorError::UnsupportedLanguage("zh".to_string())),
        );
        assert!(mock
            .translate("hello", &locale("en"), &locale("zh"))
            .await
            .is_err());
        assert_eq!(
            mock.translate("hello", &locale("en"), &locale("fr"))
                .await
                .unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn test_omitted_text_shortens_batch() {
        let mock = MockTranslator::new(MockMode::Suffix).omitting("b");
        let texts = vec!["a".to_string(), "b".to_string()];
        let results = mock
            .translate_batch(&texts, &locale("en"), &locale("fr"))
            .await
            .unwrap();
        assert_eq!(results, vec!["a_fr"]);
        assert_eq!(mock.batch_count(), 1);
    }

    #[tokio::test]
    async fn test_detecting_reports_source() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let fixed = mock
            .translate_detecting("hallo", &locale("de"), &locale("fr"))
            .await
            .unwrap();
        assert_eq!(fixed, TranslatedText::new("hallo_fr", locale("de")));

        let detected = mock
            .translate_batch_detecting(&["hello".to_string()], &Locale::auto(), &locale("fr"))
            .await
            .unwrap();
        assert_eq!(detected, vec![TranslatedText::new("hello_fr", locale("en"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_adds_latency() {
        let mock = MockTranslator::with_delay(MockMode::Suffix, 50);
        let start = tokio::time::Instant::now();
        mock.translate("hello", &locale("en"), &locale("fr"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
