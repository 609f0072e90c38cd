/// Message Pipeline
///
/// Chat messages go through a [`ProcessorPipeline<String>`] once per
/// recipient, so every processor can tailor the text to its target (the
/// translation processor translates into the target's locale). The
/// result is then rendered with a template from the placeholder engine.
///
/// # Example
///
/// ```ignore
/// use flex_chat::message::{message_pipeline, TranslationProcessor};
///
/// let pipeline = message_pipeline(None, Some(TranslationProcessor::new(translator, placeholders.clone(), locale)))?;
/// for delivery in pipeline.broadcast(&placeholders, sender, &players, "Hello", "chat_format").await {
///     host.send(&delivery.target, &delivery.formatted);
/// }
/// ```
pub mod admin_filter;
pub mod translation;

use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::context::{Arguments, Audience, Context, Key};
use crate::placeholder::PlaceholderPipeline;
use crate::processor::{PipelineError, Priority, ProcessorPipeline};

pub use admin_filter::{AdminFilterProcessor, ChatFilter};
pub use translation::{TranslationProcessor, strip_colors};

pub type MessagePipeline = ProcessorPipeline<String>;

pub const ADMIN_FILTER: &str = "admin_filter";
pub const TRANSLATION: &str = "translation";

/// A message ready to be sent to one recipient.
pub struct Delivery {
    pub target: Arc<dyn Audience>,
    /// The rendered template
    pub formatted: String,
    /// The message after the pipeline, before rendering
    pub processed: String,
}

/// Message pipeline with the built-in processors that were provided.
///
/// The admin filter runs first so nothing is translated before moderation.
pub fn message_pipeline(
    admin_filter: Option<AdminFilterProcessor>,
    translation: Option<TranslationProcessor>,
) -> Result<MessagePipeline, PipelineError> {
    let pipeline = MessagePipeline::new("message");
    if let Some(processor) = admin_filter {
        pipeline.register(ADMIN_FILTER, Priority::HIGHEST, processor)?;
    }
    if let Some(processor) = translation {
        pipeline.register(TRANSLATION, Priority::LOW, processor)?;
    }
    Ok(pipeline)
}

impl ProcessorPipeline<String> {
    /// Process `message` for every target and render it with `template`.
    ///
    /// Targets are handled concurrently. Those whose processed message or
    /// rendering is blank are left out; the rest keep their order.
    pub async fn broadcast(
        &self,
        placeholders: &PlaceholderPipeline,
        sender: Arc<dyn Audience>,
        targets: &[Arc<dyn Audience>],
        message: &str,
        template: &str,
    ) -> Vec<Delivery> {
        let format = format!("%template:{}%", template);
        let deliveries = targets.iter().map(|target| {
            let sender = Arc::clone(&sender);
            let target = Arc::clone(target);
            let format = format.as_str();
            async move {
                let processed = self
                    .pump(&Context::chat(Arc::clone(&sender), Arc::clone(&target), message))
                    .await;
                if processed.trim().is_empty() {
                    debug!(
                        "Message of {} to {} was dropped by the pipeline",
                        sender.name().as_deref().unwrap_or("Unknown"),
                        target.name().as_deref().unwrap_or("Unknown")
                    );
                    return None;
                }

                let ctx = Context::chat(sender, Arc::clone(&target), format)
                    .with_arguments(Arguments::new().with(Key::MESSAGE, processed.as_str()));
                let formatted = placeholders.pump(&ctx).await;
                if formatted.trim().is_empty() {
                    return None;
                }

                Some(Delivery {
                    target,
                    formatted,
                    processed,
                })
            }
        });

        join_all(deliveries).await.into_iter().flatten().collect()
    }
}
