//! Round-robin failover over several translators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

use crate::translator::error::{TranslatorError, TranslatorResult};
use crate::translator::translator::{Locale, TranslatedText, Translator};

/// Spreads requests over `translators`, starting each call one position
/// further than the previous one. A failing translator hands the request to
/// the next one in ring order; once all failed, `fallback` answers.
pub struct RollingTranslator {
    translators: Vec<Arc<dyn Translator>>,
    fallback: Arc<dyn Translator>,
    cursor: AtomicUsize,
}

impl RollingTranslator {
    pub fn new(translators: Vec<Arc<dyn Translator>>, fallback: Arc<dyn Translator>) -> Self {
        Self {
            translators,
            fallback,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the start index for one top-level call.
    fn advance(&self) -> usize {
        let len = self.translators.len();
        if len == 0 {
            return 0;
        }
        // The closure never returns None, so both arms carry the previous value
        match self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + 1) % len))
        {
            Ok(previous) | Err(previous) => previous,
        }
    }

    async fn roll<'a, T, F>(&'a self, operation: F) -> TranslatorResult<T>
    where
        F: Fn(&'a dyn Translator) -> BoxFuture<'a, TranslatorResult<T>>,
    {
        let start = self.advance();
        let len = self.translators.len();

        for offset in 0..len {
            let translator = &self.translators[(start + offset) % len];
            match operation(translator.as_ref()).await {
                Ok(result) => return Ok(result),
                Err(e) => log_failure(translator.provider_name(), &e),
            }
        }

        operation(self.fallback.as_ref()).await
    }
}

fn log_failure(provider: &str, error: &TranslatorError) {
    debug!("Translator {} failed, trying next: {}", provider, error);
}

#[async_trait]
impl Translator for RollingTranslator {
    async fn translate_detecting(
        &self,
        text: &str,
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<TranslatedText> {
        self.roll(|t| t.translate_detecting(text, source, target))
            .await
    }

    async fn translate_batch_detecting(
        &self,
        texts: &[String],
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<Vec<TranslatedText>> {
        self.roll(|t| t.translate_batch_detecting(texts, source, target))
            .await
    }

    fn provider_name(&self) -> &str {
        "Rolling"
    }
}
