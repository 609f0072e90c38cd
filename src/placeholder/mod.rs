/// Placeholder Interpolation
///
/// Replaces `%name%` and `%name:query%` tokens in text with the output of
/// the processor registered under `name`. `%%` is a literal `%`.
///
/// A token is handled in one of three ways:
///
/// 1. The processor returns text: the token is replaced by it
/// 2. The processor returns empty text: the token is removed
/// 3. No processor, no value, an error or a panic: the token stays as written
///
/// Resolved text is not scanned again. Processors that need nested
/// interpolation, like `template`, call back into the engine with a deeper
/// context; past [`MAX_DEPTH`] the engine returns text untouched.
pub mod filter;
pub mod processors;
pub mod template;

use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, LazyLock};

use futures::FutureExt;
use regex::Regex;
use tracing::{error, warn};

use crate::context::Context;
use crate::processor::{PipelineError, Priority, Processor, ProcessorPipeline};

pub use filter::FilterNode;
pub use processors::{ArgumentProcessor, AudienceProcessor, PermissionProcessor};
pub use template::{Template, TemplateManager, TemplateProcessor, TemplateStep};

/// Deepest context the engine still interpolates.
pub const MAX_DEPTH: usize = 16;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%(\w*)(?::([^%\s]*))?%").expect("placeholder pattern is valid")
});

/// One `%...%` occurrence, detached from the scanned text.
struct Token {
    range: Range<usize>,
    name: String,
    query: Option<String>,
}

fn scan(text: &str) -> Vec<Token> {
    PLACEHOLDER_REGEX
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            Some(Token {
                range: whole.range(),
                name: captures.get(1).map_or("", |m| m.as_str()).to_string(),
                query: captures.get(2).map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

pub struct PlaceholderPipeline {
    processors: ProcessorPipeline<Option<String>>,
}

impl PlaceholderPipeline {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            processors: ProcessorPipeline::new("placeholder"),
        })
    }

    /// Engine with the `argument`, `audience`, `permission` and `template`
    /// processors registered.
    pub fn with_defaults(templates: Arc<TemplateManager>) -> Result<Arc<Self>, PipelineError> {
        let engine = Self::new();
        engine.register("argument", ArgumentProcessor)?;
        engine.register("audience", AudienceProcessor)?;
        engine.register("permission", PermissionProcessor)?;
        engine.register(
            "template",
            TemplateProcessor::new(Arc::downgrade(&engine), templates),
        )?;
        Ok(engine)
    }

    pub fn register<P>(&self, name: &str, processor: P) -> Result<(), PipelineError>
    where
        P: Processor<Option<String>> + 'static,
    {
        self.processors.register(name, Priority::NORMAL, processor)
    }

    /// Interpolate the context message.
    pub async fn pump(&self, ctx: &Context) -> String {
        self.interpolate(ctx, &ctx.message).await
    }

    /// Interpolate `text` on behalf of `ctx`.
    pub async fn interpolate(&self, ctx: &Context, text: &str) -> String {
        if ctx.depth > MAX_DEPTH {
            warn!(
                "Placeholder nesting deeper than {}, leaving '{}' as is",
                MAX_DEPTH, text
            );
            return text.to_string();
        }

        let tokens = scan(text);
        if tokens.is_empty() {
            return text.to_string();
        }

        let mut result = String::with_capacity(text.len());
        let mut last = 0;
        for token in tokens {
            result.push_str(&text[last..token.range.start]);
            let literal = &text[token.range.clone()];
            match (token.name.as_str(), &token.query) {
                ("", None) => result.push('%'),
                ("", Some(_)) => result.push_str(literal),
                (name, query) => {
                    let query = query.as_deref().unwrap_or("");
                    match self.resolve(ctx, name, query).await {
                        Some(value) => result.push_str(&value),
                        None => result.push_str(literal),
                    }
                }
            }
            last = token.range.end;
        }
        result.push_str(&text[last..]);
        result
    }

    async fn resolve(&self, ctx: &Context, name: &str, query: &str) -> Option<String> {
        let processor = self.processors.processor(name)?;
        let request = ctx.with_message(query);
        match AssertUnwindSafe(processor.process(&request)).catch_unwind().await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                error!(
                    "Error while interpolating placeholder '{}:{}': {}",
                    name, query, e
                );
                None
            }
            Err(_) => {
                error!("Placeholder '{}:{}' panicked", name, query);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Arguments, EmptyAudience, Key, SimpleAudience};
    use crate::processor::{ProcessorError, ProcessorResult, simple};
    use std::collections::HashMap;

    fn ctx(message: &str) -> Context {
        Context::new(Arc::new(EmptyAudience), message)
    }

    fn constant(value: &'static str) -> impl Processor<Option<String>> {
        simple(move |_: &Context| Ok(Some(value.to_string())))
    }

    fn engine_with_templates(templates: Vec<(&str, Vec<TemplateStep>)>) -> Arc<PlaceholderPipeline> {
        let templates = templates
            .into_iter()
            .map(|(name, steps)| (name.to_string(), Template::new(steps)))
            .collect::<HashMap<_, _>>();
        PlaceholderPipeline::with_defaults(Arc::new(TemplateManager::new(templates))).unwrap()
    }

    #[tokio::test]
    async fn test_simple_placeholder() {
        let engine = PlaceholderPipeline::new();
        engine.register("test", constant("value")).unwrap();
        assert_eq!(engine.pump(&ctx("test")).await, "test");
        assert_eq!(engine.pump(&ctx("%test%")).await, "value");
        assert_eq!(
            engine.pump(&ctx("hello %test% world")).await,
            "hello value world"
        );
    }

    #[tokio::test]
    async fn test_multiple_placeholders() {
        let engine = PlaceholderPipeline::new();
        engine.register("test1", constant("value1")).unwrap();
        engine.register("test2", constant("value2")).unwrap();
        assert_eq!(
            engine.pump(&ctx("hello %test1% %test2% world")).await,
            "hello value1 value2 world"
        );
    }

    #[tokio::test]
    async fn test_panicking_placeholder_stays_verbatim() {
        let engine = PlaceholderPipeline::new();
        engine
            .register(
                "broken",
                simple(|_: &Context| -> ProcessorResult<Option<String>> { panic!("placeholder bug") }),
            )
            .unwrap();
        engine.register("test", constant("value")).unwrap();
        assert_eq!(
            engine.pump(&ctx("%broken:x% and %test%")).await,
            "%broken:x% and value"
        );
    }

    #[tokio::test]
    async fn test_empty_placeholder_is_removed() {
        let engine = PlaceholderPipeline::new();
        engine.register("test", constant("")).unwrap();
        assert_eq!(engine.pump(&ctx("hello %test% world")).await, "hello  world");
    }

    #[tokio::test]
    async fn test_unresolved_placeholders_stay_verbatim() {
        let engine = PlaceholderPipeline::new();
        engine
            .register("none", simple(|_: &Context| -> ProcessorResult<Option<String>> { Ok(None) }))
            .unwrap();
        engine
            .register(
                "throwing",
                simple(|_: &Context| -> ProcessorResult<Option<String>> {
                    Err(ProcessorError::Failed("expected".to_string()))
                }),
            )
            .unwrap();

        for text in [
            "hello %none% world",
            "hello %throwing% world",
            "hello %unknown% world",
            "hello %unknown:some:query% world",
        ] {
            assert_eq!(engine.pump(&ctx(text)).await, text);
        }
    }

    #[tokio::test]
    async fn test_percent_escape_and_stray_percents() {
        let engine = PlaceholderPipeline::new();
        engine.register("test", constant("value")).unwrap();
        assert_eq!(engine.pump(&ctx("100%% %test%")).await, "100% value");
        assert_eq!(
            engine.pump(&ctx("50% off, 20% more")).await,
            "50% off, 20% more"
        );
    }

    #[tokio::test]
    async fn test_query_is_passed_to_processor() {
        let engine = PlaceholderPipeline::new();
        engine
            .register("echo", simple(|ctx: &Context| Ok(Some(format!("<{}>", ctx.message)))))
            .unwrap();
        assert_eq!(
            engine.pump(&ctx("%echo% %echo:a% %echo:a:b%")).await,
            "<> <a> <a:b>"
        );
    }

    #[tokio::test]
    async fn test_resolved_text_is_not_rescanned() {
        let engine = PlaceholderPipeline::new();
        engine.register("inner", constant("value")).unwrap();
        engine.register("outer", constant("%inner%")).unwrap();
        assert_eq!(engine.pump(&ctx("%outer%")).await, "%inner%");
    }

    #[tokio::test]
    async fn test_template() {
        let engine = engine_with_templates(vec![(
            "test",
            vec![TemplateStep::new("hello %test% world")],
        )]);
        engine.register("test", constant("value")).unwrap();
        assert_eq!(
            engine.pump(&ctx("%template:test%")).await,
            "hello value world"
        );
    }

    #[tokio::test]
    async fn test_escape_meta_chars() {
        for meta in ["$", "\\", "$1", "${0}"] {
            let engine = engine_with_templates(vec![(
                "test",
                vec![TemplateStep::new("hello %test% world")],
            )]);
            engine.register("test", constant(meta)).unwrap();
            assert_eq!(engine.pump(&ctx(meta)).await, meta);
            assert_eq!(
                engine.pump(&ctx("%template:test%")).await,
                format!("hello {} world", meta)
            );
        }
    }

    #[tokio::test]
    async fn test_template_steps_toggle_on_filters() {
        let engine = engine_with_templates(vec![(
            "chat",
            vec![
                TemplateStep::new("[admin] ")
                    .with_filter(FilterNode::raw("permission:chat.admin")),
                TemplateStep::new("%audience:name%"),
                TemplateStep::new(" (muted)")
                    .with_filter(FilterNode::raw("argument:flex:muted")),
                TemplateStep::new(": %argument:flex:message%"),
            ],
        )]);

        let admin = SimpleAudience::player("alice").with_permission("chat.admin");
        let ctx = Context::new(Arc::new(admin), "%template:chat%")
            .with_arguments(Arguments::new().with(Key::MESSAGE, "hi"));
        assert_eq!(engine.pump(&ctx).await, "[admin] alice: hi");

        let ctx = Context::new(Arc::new(SimpleAudience::player("bob")), "%template:chat%")
            .with_arguments(
                Arguments::new()
                    .with(Key::MESSAGE, "hi")
                    .with(Key::new("flex", "muted"), "yes"),
            );
        assert_eq!(engine.pump(&ctx).await, "bob (muted): hi");
    }

    #[tokio::test]
    async fn test_unknown_template_stays_verbatim() {
        let engine = engine_with_templates(vec![]);
        assert_eq!(
            engine.pump(&ctx("%template:missing%")).await,
            "%template:missing%"
        );
    }

    #[tokio::test]
    async fn test_self_referential_template_terminates() {
        let engine = engine_with_templates(vec![(
            "loop",
            vec![TemplateStep::new("x%template:loop%")],
        )]);
        let result = engine.pump(&ctx("%template:loop%")).await;
        assert!(result.starts_with("xxx"));
        assert!(result.ends_with("%template:loop%"));
        assert_eq!(result.matches('x').count(), MAX_DEPTH + 1);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let engine = PlaceholderPipeline::new();
        engine.register("test", constant("value")).unwrap();
        let mut deep = ctx("%test%");
        deep.depth = MAX_DEPTH + 1;
        assert_eq!(engine.pump(&deep).await, "%test%");
    }
}
