//! Marshalling work onto the host's single game-logic thread.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::ThreadId;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::context::Context;
use crate::processor::error::{ProcessorError, ProcessorResult};
use crate::processor::Processor;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The thread that owns the game state.
pub trait MainThread: Send + Sync {
    /// Queue `task` for execution. Returns `false` if the thread no longer
    /// accepts work.
    fn post(&self, task: Task) -> bool;

    /// Whether the caller is already running on the main thread.
    fn is_current(&self) -> bool;
}

/// A dedicated thread draining a task queue in order.
///
/// The thread stops once every handle to the queue is dropped.
pub struct QueueMainThread {
    sender: mpsc::UnboundedSender<Task>,
    thread: ThreadId,
}

impl QueueMainThread {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(task) = receiver.blocking_recv() {
                    task();
                }
                debug!("Main thread queue closed");
            })?;

        Ok(Self {
            sender,
            thread: handle.thread().id(),
        })
    }
}

impl MainThread for QueueMainThread {
    fn post(&self, task: Task) -> bool {
        self.sender.send(task).is_ok()
    }

    fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread
    }
}

/// Run `f` on the main thread and wait for its result without blocking the
/// caller's thread.
pub async fn run_on<T, F>(main: &dyn MainThread, f: F) -> ProcessorResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let posted = main.post(Box::new(move || {
        let _ = sender.send(catch_unwind(AssertUnwindSafe(f)));
    }));
    if !posted {
        return Err(ProcessorError::ExecutorClosed);
    }

    match receiver.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(ProcessorError::Failed(
            "Task panicked on the main thread".to_string(),
        )),
        Err(_) => Err(ProcessorError::ExecutorClosed),
    }
}

/// Processor whose body must run on the main thread.
pub struct MainThreadProcessor<F> {
    main: Arc<dyn MainThread>,
    body: Arc<F>,
}

pub fn synchronous<O, F>(main: Arc<dyn MainThread>, body: F) -> MainThreadProcessor<F>
where
    F: Fn(&Context) -> ProcessorResult<O> + Send + Sync + 'static,
{
    MainThreadProcessor {
        main,
        body: Arc::new(body),
    }
}

#[async_trait]
impl<O, F> Processor<O> for MainThreadProcessor<F>
where
    O: Send + 'static,
    F: Fn(&Context) -> ProcessorResult<O> + Send + Sync + 'static,
{
    async fn process(&self, ctx: &Context) -> ProcessorResult<O> {
        let body = Arc::clone(&self.body);
        let ctx = ctx.clone();
        run_on(self.main.as_ref(), move || body(&ctx)).await?
    }
}
