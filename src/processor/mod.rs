/// Processor Pipelines
///
/// A pipeline is an ordered registry of named processors. The placeholder
/// engine uses it as a lookup table (one processor per placeholder name),
/// the message pipeline runs every processor in priority order.
///
/// # Example
///
/// ```ignore
/// use flex_chat::processor::{simple, Priority, ProcessorPipeline};
///
/// let pipeline = ProcessorPipeline::<String>::new("message");
/// pipeline.register("shout", Priority::NORMAL, simple(|ctx| Ok(ctx.message.to_uppercase())))?;
/// let result = pipeline.pump(&ctx).await;
/// ```
pub mod error;
pub mod executor;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error};

use crate::context::Context;

pub use error::{PipelineError, ProcessorError, ProcessorResult};
pub use executor::{MainThread, QueueMainThread};

/// Execution order of a processor. Lower runs earlier; equal priorities keep
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub i32);

impl Priority {
    pub const HIGHEST: Priority = Priority(-2);
    pub const HIGH: Priority = Priority(-1);
    pub const NORMAL: Priority = Priority(0);
    pub const LOW: Priority = Priority(1);
    pub const LOWEST: Priority = Priority(2);
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Priority::HIGHEST => write!(f, "HIGHEST"),
            Priority::HIGH => write!(f, "HIGH"),
            Priority::NORMAL => write!(f, "NORMAL"),
            Priority::LOW => write!(f, "LOW"),
            Priority::LOWEST => write!(f, "LOWEST"),
            Priority(value) => write!(f, "{}", value),
        }
    }
}

#[async_trait]
pub trait Processor<O>: Send + Sync {
    async fn process(&self, ctx: &Context) -> ProcessorResult<O>;
}

/// Processor backed by a synchronous closure.
pub struct FnProcessor<F>(F);

#[async_trait]
impl<O, F> Processor<O> for FnProcessor<F>
where
    O: Send + 'static,
    F: Fn(&Context) -> ProcessorResult<O> + Send + Sync,
{
    async fn process(&self, ctx: &Context) -> ProcessorResult<O> {
        (self.0)(ctx)
    }
}

pub fn simple<O, F>(f: F) -> FnProcessor<F>
where
    F: Fn(&Context) -> ProcessorResult<O> + Send + Sync,
{
    FnProcessor(f)
}

struct Registered<O> {
    name: String,
    priority: Priority,
    processor: Arc<dyn Processor<O>>,
}

impl<O> Clone for Registered<O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            priority: self.priority,
            processor: Arc::clone(&self.processor),
        }
    }
}

pub struct ProcessorPipeline<O> {
    identifier: String,
    processors: RwLock<Vec<Registered<O>>>,
}

impl<O: Send + 'static> ProcessorPipeline<O> {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            processors: RwLock::new(Vec::new()),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Add a processor. Names are unique per pipeline.
    pub fn register<P>(&self, name: &str, priority: Priority, processor: P) -> Result<(), PipelineError>
    where
        P: Processor<O> + 'static,
    {
        self.register_arc(name, priority, Arc::new(processor))
    }

    pub fn register_arc(
        &self,
        name: &str,
        priority: Priority,
        processor: Arc<dyn Processor<O>>,
    ) -> Result<(), PipelineError> {
        let mut processors = self
            .processors
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if processors.iter().any(|p| p.name == name) {
            return Err(PipelineError::DuplicateProcessor {
                pipeline: self.identifier.clone(),
                name: name.to_string(),
            });
        }

        // Insert after every entry of lower or equal priority
        let index = processors.partition_point(|p| p.priority <= priority);
        processors.insert(
            index,
            Registered {
                name: name.to_string(),
                priority,
                processor,
            },
        );
        debug!(
            "Registered processor {} to {} with priority {}",
            name, self.identifier, priority
        );
        Ok(())
    }

    /// Look up a single processor by name.
    pub fn processor(&self, name: &str) -> Option<Arc<dyn Processor<O>>> {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|p| p.name == name)
            .map(|p| Arc::clone(&p.processor))
    }

    /// Registered names in execution order.
    pub fn names(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|p| p.name).collect()
    }

    fn snapshot(&self) -> Vec<Registered<O>> {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProcessorPipeline<String> {
    /// Thread `ctx.message` through every processor in priority order.
    ///
    /// Each processor sees the running result as its message. A failing or
    /// panicking processor is logged and skipped. Once the result is empty
    /// the remaining processors do not run.
    pub async fn pump(&self, ctx: &Context) -> String {
        let mut result = ctx.message.clone();
        for entry in self.snapshot() {
            if result.is_empty() {
                break;
            }
            let step = ctx.with_message(result.clone());
            let outcome = AssertUnwindSafe(entry.processor.process(&step))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(ProcessorError::Failed("processor panicked".to_string())));
            match outcome {
                Ok(next) => result = next,
                Err(e) => error!(
                    "Error while processing message of {} to {} in {}: {}",
                    ctx.subject.name().as_deref().unwrap_or("Unknown"),
                    ctx.target.name().as_deref().unwrap_or("Unknown"),
                    entry.name,
                    e
                ),
            }
        }
        result
    }
}
