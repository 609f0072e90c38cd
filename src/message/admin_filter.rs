//! Host moderation filter, run on the main thread.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::context::{Audience, Context, MessageKind};
use crate::processor::executor::run_on;
use crate::processor::{MainThread, Processor, ProcessorError, ProcessorResult};

pub const ADMIN_FILTER_TIMEOUT: Duration = Duration::from_secs(5);

/// The host's chat moderation hook. Always called on the main thread.
pub trait ChatFilter: Send + Sync {
    /// The filtered message, or `None` to drop it.
    fn filter(&self, sender: &dyn Audience, message: &str) -> Option<String>;
}

/// Passes player chat through the host [`ChatFilter`].
///
/// A dropped message becomes empty text, which stops the message pipeline.
/// Calls made while already filtering (a nested context, or from the main
/// thread itself) return the message unchanged instead of waiting on a
/// thread that is busy with the caller.
pub struct AdminFilterProcessor {
    main: Arc<dyn MainThread>,
    filter: Arc<dyn ChatFilter>,
    timeout: Duration,
}

impl AdminFilterProcessor {
    pub fn new(main: Arc<dyn MainThread>, filter: Arc<dyn ChatFilter>) -> Self {
        Self {
            main,
            filter,
            timeout: ADMIN_FILTER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Processor<String> for AdminFilterProcessor {
    async fn process(&self, ctx: &Context) -> ProcessorResult<String> {
        if !ctx.subject.is_player() || ctx.kind != MessageKind::Chat {
            return Ok(ctx.message.clone());
        }
        if ctx.depth > 0 || self.main.is_current() {
            debug!(
                "Re-entrant admin filter call for message '{}' from {}, skipping",
                ctx.message,
                ctx.subject.name().as_deref().unwrap_or("Unknown")
            );
            return Ok(ctx.message.clone());
        }

        let filter = Arc::clone(&self.filter);
        let sender = Arc::clone(&ctx.subject);
        let message = ctx.message.clone();
        let filtered = run_on(self.main.as_ref(), move || {
            filter.filter(sender.as_ref(), &message).unwrap_or_default()
        });

        tokio::time::timeout(self.timeout, filtered)
            .await
            .map_err(|_| ProcessorError::Timeout)?
    }
}
