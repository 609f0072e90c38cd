pub mod config;
pub mod context;
pub mod message;
pub mod placeholder;
pub mod processor;
pub mod translator;

pub use config::{BackendConfig, ConfigError, FlexConfig, load_config_from_file};
pub use context::{Arguments, Audience, Context, Key, MessageKind, SimpleAudience};
pub use message::{Delivery, MessagePipeline, message_pipeline};
pub use placeholder::{FilterNode, PlaceholderPipeline, Template, TemplateManager, TemplateStep};
pub use processor::{Priority, Processor, ProcessorError, ProcessorPipeline};
pub use translator::{
    CachingTranslator, Locale, RollingTranslator, TranslatedText, Translator, TranslatorError,
};
