//! JSON configuration: templates and the translator backend tree.
//!
//! ```json
//! {
//!   "templates": {
//!     "chat_format": ["[%audience:color%]%audience:name%", "[]: %argument:flex:message%"]
//!   },
//!   "translator": {
//!     "backend": {
//!       "type": "caching",
//!       "translator": {
//!         "type": "rolling",
//!         "translators": [{"type": "deepl", "api_key": "..."}],
//!         "fallback": {"type": "libre-translate", "endpoint": "http://localhost:5000"}
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::message::TranslationProcessor;
use crate::placeholder::{PlaceholderPipeline, Template};
use crate::translator::caching::{
    DEFAULT_FAILURE_RETENTION, DEFAULT_MAXIMUM_SIZE, DEFAULT_SUCCESS_RETENTION,
};
use crate::translator::{
    CachingTranslator, DeepLTranslator, GoogleBasicTranslator, LibreTranslateTranslator,
    Locale, NoopTranslator, RollingTranslator, Translator, TranslatorResult,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FlexConfig {
    pub templates: HashMap<String, Template>,
    pub translator: TranslatorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub backend: BackendConfig,
    /// Add the translation processor to the message pipeline
    pub register_message_processor: bool,
}

impl TranslatorConfig {
    /// The chat translation processor, unless the config opts out of it.
    pub fn message_processor(
        &self,
        translator: Arc<dyn Translator>,
        placeholders: Arc<PlaceholderPipeline>,
        default_locale: Locale,
    ) -> Option<TranslationProcessor> {
        if !self.register_message_processor {
            info!("Chat translation is disabled");
            return None;
        }
        Some(TranslationProcessor::new(translator, placeholders, default_locale))
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::None,
            register_message_processor: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BackendConfig {
    #[default]
    None,
    LibreTranslate {
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    #[serde(rename = "deepl")]
    DeepL { api_key: String },
    GoogleBasic { api_key: String },
    Rolling {
        translators: Vec<BackendConfig>,
        #[serde(default)]
        fallback: Box<BackendConfig>,
    },
    Caching {
        /// Seconds
        #[serde(default = "default_success_retention")]
        success_retention: u64,
        /// Seconds
        #[serde(default = "default_failure_retention")]
        failure_retention: u64,
        #[serde(default = "default_maximum_size")]
        maximum_size: usize,
        translator: Box<BackendConfig>,
    },
}

fn default_success_retention() -> u64 {
    DEFAULT_SUCCESS_RETENTION.as_secs()
}

fn default_failure_retention() -> u64 {
    DEFAULT_FAILURE_RETENTION.as_secs()
}

fn default_maximum_size() -> usize {
    DEFAULT_MAXIMUM_SIZE
}

pub fn load_config_from_file(path: impl AsRef<Path>) -> Result<FlexConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<FlexConfig, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

/// Instantiate a backend tree. HTTP backends fetch their language catalogs
/// here, so this fails if one of them is unreachable.
pub fn build_translator<'a>(
    config: &'a BackendConfig,
    client: &'a reqwest::Client,
) -> BoxFuture<'a, TranslatorResult<Arc<dyn Translator>>> {
    async move {
        let translator: Arc<dyn Translator> = match config {
            BackendConfig::None => Arc::new(NoopTranslator),
            BackendConfig::LibreTranslate { endpoint, api_key } => Arc::new(
                LibreTranslateTranslator::connect(client.clone(), endpoint.as_str(), api_key.clone())
                    .await?,
            ),
            BackendConfig::DeepL { api_key } => {
                Arc::new(DeepLTranslator::connect(client.clone(), api_key.clone()).await?)
            }
            BackendConfig::GoogleBasic { api_key } => {
                Arc::new(GoogleBasicTranslator::connect(client.clone(), api_key.clone()).await?)
            }
            BackendConfig::Rolling {
                translators,
                fallback,
            } => {
                let mut built = Vec::with_capacity(translators.len());
                for translator in translators {
                    built.push(build_translator(translator, client).await?);
                }
                let fallback = build_translator(fallback, client).await?;
                Arc::new(RollingTranslator::new(built, fallback))
            }
            BackendConfig::Caching {
                success_retention,
                failure_retention,
                maximum_size,
                translator,
            } => {
                let inner = build_translator(translator, client).await?;
                Arc::new(CachingTranslator::new(
                    inner,
                    *maximum_size,
                    Duration::from_secs(*success_retention),
                    Duration::from_secs(*failure_retention),
                )?)
            }
        };
        info!("Using the {} translator", translator.provider_name());
        Ok(translator)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{TRANSLATION, message_pipeline};
    use crate::placeholder::{FilterNode, TemplateManager, TemplateStep};
    use crate::translator::TranslatorError;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert!(config.templates.is_empty());
        assert_eq!(config.translator.backend, BackendConfig::None);
        assert!(config.translator.register_message_processor);
    }

    #[test]
    fn test_parse_templates_and_filters() {
        let config = parse_config(
            r#"{
                "templates": {
                    "chat_format": [
                        {"text": "[admin] ", "if": {"any": ["permission:chat.admin", "permission:chat.mod"]}},
                        "%audience:name%: %argument:flex:message%"
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.templates["chat_format"].steps,
            vec![
                TemplateStep::new("[admin] ").with_filter(FilterNode::Any(vec![
                    FilterNode::raw("permission:chat.admin"),
                    FilterNode::raw("permission:chat.mod"),
                ])),
                TemplateStep::new("%audience:name%: %argument:flex:message%"),
            ]
        );
    }

    #[test]
    fn test_parse_backend_tree() {
        let config = parse_config(
            r#"{
                "translator": {
                    "register_message_processor": false,
                    "backend": {
                        "type": "caching",
                        "failure_retention": 30,
                        "translator": {
                            "type": "rolling",
                            "translators": [
                                {"type": "deepl", "api_key": "key:fx"},
                                {"type": "google-basic", "api_key": "key"}
                            ],
                            "fallback": {"type": "libre-translate", "endpoint": "http://localhost:5000"}
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        assert!(!config.translator.register_message_processor);
        assert_eq!(
            config.translator.backend,
            BackendConfig::Caching {
                success_retention: 600,
                failure_retention: 30,
                maximum_size: 1000,
                translator: Box::new(BackendConfig::Rolling {
                    translators: vec![
                        BackendConfig::DeepL {
                            api_key: "key:fx".to_string()
                        },
                        BackendConfig::GoogleBasic {
                            api_key: "key".to_string()
                        },
                    ],
                    fallback: Box::new(BackendConfig::LibreTranslate {
                        endpoint: "http://localhost:5000".to_string(),
                        api_key: None,
                    }),
                }),
            }
        );
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            parse_config(r#"{"translator": {"backend": {"type": "babelfish"}}}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            load_config_from_file("/nonexistent/flex.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_build_offline_tree() {
        let config = BackendConfig::Caching {
            success_retention: 60,
            failure_retention: 5,
            maximum_size: 10,
            translator: Box::new(BackendConfig::Rolling {
                translators: vec![],
                fallback: Box::new(BackendConfig::None),
            }),
        };
        let translator = build_translator(&config, &reqwest::Client::new()).await.unwrap();
        let result = translator
            .translate(
                "hello",
                &Locale::parse("en").unwrap(),
                &Locale::parse("fr").unwrap(),
            )
            .await;
        assert_eq!(
            result,
            Err(TranslatorError::UnsupportedLanguage("fr".to_string()))
        );
    }

    #[tokio::test]
    async fn test_build_rejects_empty_cache() {
        let config = BackendConfig::Caching {
            success_retention: 60,
            failure_retention: 5,
            maximum_size: 0,
            translator: Box::new(BackendConfig::None),
        };
        assert!(matches!(
            build_translator(&config, &reqwest::Client::new()).await,
            Err(TranslatorError::ConfigError(_))
        ));
    }

    #[test]
    fn test_message_processor_follows_flag() {
        let placeholders =
            PlaceholderPipeline::with_defaults(Arc::new(TemplateManager::new(HashMap::new()))).unwrap();
        let en = Locale::parse("en").unwrap();

        let enabled = parse_config("{}").unwrap().translator;
        let processor = enabled.message_processor(Arc::new(NoopTranslator), placeholders.clone(), en.clone());
        assert_eq!(
            message_pipeline(None, processor).unwrap().names(),
            vec![TRANSLATION]
        );

        let disabled = parse_config(r#"{"translator": {"register_message_processor": false}}"#)
            .unwrap()
            .translator;
        let processor = disabled.message_processor(Arc::new(NoopTranslator), placeholders, en);
        assert!(processor.is_none());
        assert!(message_pipeline(None, processor).unwrap().names().is_empty());
    }
}
