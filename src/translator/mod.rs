/// Translation Module
///
/// Machine translation of chat messages behind the [`Translator`] trait.
///
/// # Overview
///
/// 1. **Backends** - Google basic v2, LibreTranslate and DeepL adapters over an injected HTTP client
/// 2. **RollingTranslator** - Round-robin failover across backends, with a fallback
/// 3. **CachingTranslator** - Single-flight cache with separate success and failure retention
/// 4. **MockTranslator** - Deterministic backend for tests
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use flex_chat::translator::{CachingTranslator, Locale, NoopTranslator, RollingTranslator, Translator};
///
/// let rolling = RollingTranslator::new(vec![Arc::new(deepl), Arc::new(libre)], Arc::new(NoopTranslator));
/// let translator = CachingTranslator::with_defaults(Arc::new(rolling));
/// let text = translator.translate("Hello", &Locale::parse("en")?, &Locale::parse("fr")?).await?;
/// ```
pub mod caching;
pub mod deepl;
pub mod error;
pub mod google_basic;
mod http;
pub mod libre_translate;
pub mod mock;
pub mod rolling;
#[allow(clippy::module_inception)]
pub mod translator;

pub use caching::CachingTranslator;
pub use deepl::DeepLTranslator;
pub use error::{TranslatorError, TranslatorResult};
pub use google_basic::GoogleBasicTranslator;
pub use libre_translate::LibreTranslateTranslator;
pub use mock::{MockMode, MockTranslator};
pub use rolling::RollingTranslator;
pub use translator::{
    AUTO_DETECT, LanguageCatalog, Locale, NoopTranslator, ROUTER_MARKER, TranslatedText,
    TranslationKey, TranslationResult, Translator, preflight,
};
