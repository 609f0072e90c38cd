//! Caching decorator with separate retention for successes and failures.
//!
//! Entries are keyed by [`TranslationKey::normalized`], so regional variants
//! of a language share results. Concurrent requests for a key that is still
//! loading wait on the same backend call. Loads run on spawned tasks: a
//! caller that stops waiting (for instance after a timeout) does not cancel
//! the request, and its result still lands in the cache. A backend that
//! panics is recorded as a failure.
//!
//! Expiry follows these rules:
//!
//! | Event            | Success            | Failure                  |
//! |------------------|--------------------|--------------------------|
//! | create / update  | success retention  | failure retention        |
//! | read             | reset to success   | unchanged                |

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared, try_join_all};
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::translator::error::{TranslatorError, TranslatorResult};
use crate::translator::translator::{
    Locale, TranslatedText, TranslationKey, TranslationResult, Translator,
};

pub const DEFAULT_MAXIMUM_SIZE: usize = 1000;
pub const DEFAULT_SUCCESS_RETENTION: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_FAILURE_RETENTION: Duration = Duration::from_secs(10);

type SharedResult = Shared<BoxFuture<'static, TranslationResult>>;
type Entries = Arc<Mutex<LruCache<TranslationKey, Slot>>>;

enum Slot {
    Loading(SharedResult),
    Ready {
        result: TranslationResult,
        expires_at: Instant,
    },
}

/// What a lookup found, detached from the map borrow.
enum Lookup {
    Hit(TranslationResult),
    Pending(SharedResult),
    Miss,
}

#[derive(Debug, Clone, Copy)]
struct Retention {
    success: Duration,
    failure: Duration,
}

impl Retention {
    /// Lifetime granted when an entry is created or overwritten.
    fn after_write(&self, result: &TranslationResult) -> Duration {
        match result {
            Ok(_) => self.success,
            Err(_) => self.failure,
        }
    }

    /// Lifetime left after a read, given what remained before it.
    fn after_read(&self, result: &TranslationResult, remaining: Duration) -> Duration {
        match result {
            Ok(_) => self.success,
            Err(_) => remaining,
        }
    }
}

pub struct CachingTranslator {
    inner: Arc<dyn Translator>,
    entries: Entries,
    retention: Retention,
}

impl CachingTranslator {
    /// # Errors
    ///
    /// `ConfigError` if `maximum_size` is zero.
    pub fn new(
        inner: Arc<dyn Translator>,
        maximum_size: usize,
        success_retention: Duration,
        failure_retention: Duration,
    ) -> TranslatorResult<Self> {
        let capacity = NonZeroUsize::new(maximum_size).ok_or_else(|| {
            TranslatorError::ConfigError("maximum cache size must be positive".to_string())
        })?;

        Ok(Self {
            inner,
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            retention: Retention {
                success: success_retention,
                failure: failure_retention,
            },
        })
    }

    pub fn with_defaults(inner: Arc<dyn Translator>) -> Self {
        Self {
            inner,
            entries: Arc::new(Mutex::new(LruCache::new(
                NonZeroUsize::MIN.saturating_add(DEFAULT_MAXIMUM_SIZE - 1),
            ))),
            retention: Retention {
                success: DEFAULT_SUCCESS_RETENTION,
                failure: DEFAULT_FAILURE_RETENTION,
            },
        }
    }

    /// Number of entries currently held, loading ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn lookup(&self, entries: &mut LruCache<TranslationKey, Slot>, key: &TranslationKey) -> Lookup {
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(Slot::Ready { result, expires_at }) if *expires_at > now => {
                let remaining = *expires_at - now;
                *expires_at = now + self.retention.after_read(result, remaining);
                Lookup::Hit(result.clone())
            }
            Some(Slot::Loading(pending)) => Lookup::Pending(pending.clone()),
            _ => Lookup::Miss,
        }
    }

    async fn get(&self, key: TranslationKey) -> TranslationResult {
        let mut entries = self.entries.lock().await;
        let pending = match self.lookup(&mut entries, &key) {
            Lookup::Hit(result) => return result,
            Lookup::Pending(pending) => pending,
            Lookup::Miss => {
                let pending = self.spawn_load(key.clone());
                entries.put(key, Slot::Loading(pending.clone()));
                pending
            }
        };
        drop(entries);
        pending.await
    }

    fn spawn_load(&self, key: TranslationKey) -> SharedResult {
        let inner = Arc::clone(&self.inner);
        let entries = Arc::clone(&self.entries);
        let retention = self.retention;

        let task = tokio::spawn(async move {
            let result = AssertUnwindSafe(inner.translate_detecting(&key.text, &key.source, &key.target))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(panicked(inner.provider_name())));
            let expires_at = Instant::now() + retention.after_write(&result);
            entries.lock().await.put(
                key,
                Slot::Ready {
                    result: result.clone(),
                    expires_at,
                },
            );
            result
        });

        async move { task.await.unwrap_or_else(|e| Err(join_failure(e))) }
            .boxed()
            .shared()
    }

    async fn get_all(&self, keys: Vec<TranslationKey>) -> TranslatorResult<Vec<TranslatedText>> {
        let mut entries = self.entries.lock().await;
        let mut lookups = Vec::with_capacity(keys.len());
        let mut groups: Vec<((Locale, Locale), Vec<TranslationKey>)> = Vec::new();
        let mut seen = HashSet::new();

        for key in &keys {
            let lookup = self.lookup(&mut entries, key);
            if matches!(lookup, Lookup::Miss) && seen.insert(key.clone()) {
                let pair = (key.source.clone(), key.target.clone());
                match groups.iter_mut().find(|(p, _)| *p == pair) {
                    Some((_, group)) => group.push(key.clone()),
                    None => groups.push((pair, vec![key.clone()])),
                }
            }
            lookups.push(lookup);
        }

        for ((source, target), group) in groups {
            debug!(
                "Loading {} uncached translations from {} to {}",
                group.len(),
                source,
                target
            );
            for (key, pending) in self.spawn_load_group(source, target, group) {
                entries.put(key, Slot::Loading(pending));
            }
        }

        // Misses now have a loading slot, look them up again
        let mut waiting = Vec::with_capacity(keys.len());
        for (key, lookup) in keys.iter().zip(lookups) {
            let pending = match lookup {
                Lookup::Hit(result) => async move { result }.boxed().shared(),
                Lookup::Pending(pending) => pending,
                Lookup::Miss => match entries.peek(key) {
                    Some(Slot::Loading(pending)) => pending.clone(),
                    _ => {
                        return Err(TranslatorError::MissingResult(key.text.clone()));
                    }
                },
            };
            waiting.push(pending);
        }
        drop(entries);

        try_join_all(waiting).await
    }

    /// One backend batch call for keys sharing a locale pair, yielding a
    /// per-key future for each of them.
    fn spawn_load_group(
        &self,
        source: Locale,
        target: Locale,
        keys: Vec<TranslationKey>,
    ) -> Vec<(TranslationKey, SharedResult)> {
        let inner = Arc::clone(&self.inner);
        let entries = Arc::clone(&self.entries);
        let retention = self.retention;
        let batch_keys = keys.clone();

        let task = tokio::spawn(async move {
            let texts: Vec<String> = batch_keys.iter().map(|k| k.text.clone()).collect();
            let outcome = AssertUnwindSafe(inner.translate_batch_detecting(&texts, &source, &target))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(panicked(inner.provider_name())));

            let now = Instant::now();
            let mut entries = entries.lock().await;
            for (i, key) in batch_keys.into_iter().enumerate() {
                let result = match &outcome {
                    Ok(translations) => match translations.get(i) {
                        Some(translation) => Ok(translation.clone()),
                        None => {
                            warn!("Batch response from {} is missing '{}'", inner.provider_name(), key.text);
                            entries.pop(&key);
                            continue;
                        }
                    },
                    Err(e) => Err(e.clone()),
                };
                let expires_at = now + retention.after_write(&result);
                entries.put(key, Slot::Ready { result, expires_at });
            }
            outcome
        });

        let batch = async move { task.await.unwrap_or_else(|e| Err(join_failure(e))) }
            .boxed()
            .shared();

        keys.into_iter()
            .enumerate()
            .map(|(i, key)| {
                let batch = batch.clone();
                let text = key.text.clone();
                let pending = async move {
                    let translations = batch.await?;
                    translations
                        .get(i)
                        .cloned()
                        .ok_or(TranslatorError::MissingResult(text))
                }
                .boxed()
                .shared();
                (key, pending)
            })
            .collect()
    }
}

fn panicked(provider: &str) -> TranslatorError {
    error!("Translator {} panicked", provider);
    TranslatorError::TranslationError(format!("{} panicked", provider))
}

fn join_failure(error: tokio::task::JoinError) -> TranslatorError {
    TranslatorError::TranslationError(format!("Translation task failed: {}", error))
}

#[async_trait]
impl Translator for CachingTranslator {
    async fn translate_detecting(
        &self,
        text: &str,
        source: &Locale,
        target: &Locale,
    ) -> TranslationResult {
        self.get(TranslationKey::normalized(text, source, target))
            .await
    }

    async fn translate_batch_detecting(
        &self,
        texts: &[String],
        source: &Locale,
        target: &Locale,
    ) -> TranslatorResult<Vec<TranslatedText>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let keys = texts
            .iter()
            .map(|text| TranslationKey::normalized(text.as_str(), source, target))
            .collect();
        self.get_all(keys).await
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}
