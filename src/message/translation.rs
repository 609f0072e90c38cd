//! Appends a machine translation to chat messages.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::{Captures, Regex};
use tracing::{debug, error};

use crate::context::{Context, Key, MessageKind};
use crate::placeholder::PlaceholderPipeline;
use crate::processor::{Processor, ProcessorResult};
use crate::translator::{Locale, Translator, TranslatorError};

pub const TRANSLATION_TIMEOUT: Duration = Duration::from_secs(3);

/// Template used to combine a message with its translation. It receives
/// `flex:message` and `flex:translated_message` as arguments.
pub const TRANSLATOR_FORMAT: &str = "%template:translator_format%";

static COLOR_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[|\[(?:#[0-9a-fA-F]{3,8}|[a-zA-Z_]*)\]").expect("color tag pattern is valid")
});

/// Remove `[color]` markup. `[[` is an escaped bracket.
pub fn strip_colors(text: &str) -> String {
    COLOR_TAG_REGEX
        .replace_all(text, |captures: &Captures| {
            if &captures[0] == "[[" {
                "[".to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Translates chat from the sender's locale into the target's.
///
/// The original message is kept whenever translation fails, times out, or
/// produces the same text.
pub struct TranslationProcessor {
    translator: Arc<dyn Translator>,
    placeholders: Arc<PlaceholderPipeline>,
    /// Used for audiences without a locale
    default_locale: Locale,
    timeout: Duration,
}

impl TranslationProcessor {
    pub fn new(
        translator: Arc<dyn Translator>,
        placeholders: Arc<PlaceholderPipeline>,
        default_locale: Locale,
    ) -> Self {
        Self {
            translator,
            placeholders,
            default_locale,
            timeout: TRANSLATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn translate(&self, text: &str, source: &Locale, target: &Locale) -> Option<String> {
        let result = tokio::time::timeout(
            self.timeout,
            self.translator.translate(text, source, target),
        )
        .await
        .unwrap_or(Err(TranslatorError::Timeout));

        match result {
            Ok(translation) => Some(translation),
            Err(TranslatorError::RateLimited) => {
                debug!("The {} translator is rate limited", self.translator.provider_name());
                None
            }
            Err(TranslatorError::UnsupportedLanguage(_)) => None,
            Err(e) => {
                error!(
                    "Failed to translate the message '{}' from {} to {}: {}",
                    text, source, target, e
                );
                None
            }
        }
    }
}

#[async_trait]
impl Processor<String> for TranslationProcessor {
    async fn process(&self, ctx: &Context) -> ProcessorResult<String> {
        if ctx.kind != MessageKind::Chat {
            return Ok(ctx.message.clone());
        }

        let source = ctx.subject.locale().unwrap_or_else(|| self.default_locale.clone());
        let target = ctx.target.locale().unwrap_or_else(|| self.default_locale.clone());
        let raw = strip_colors(&ctx.message).to_lowercase();

        let Some(translated) = self.translate(&raw, &source, &target).await else {
            return Ok(ctx.message.clone());
        };
        if raw == translated.to_lowercase() {
            return Ok(ctx.message.clone());
        }

        let arguments = ctx
            .arguments
            .clone()
            .with(Key::MESSAGE, ctx.message.as_str())
            .with(Key::TRANSLATED_MESSAGE, translated.as_str());
        let formatted = self
            .placeholders
            .pump(&ctx.with_message(TRANSLATOR_FORMAT).with_arguments(arguments))
            .await;

        if formatted.trim().is_empty() || formatted == TRANSLATOR_FORMAT {
            Ok(format!("{} [lightgray]({})", ctx.message, translated))
        } else {
            Ok(formatted)
        }
    }
}
