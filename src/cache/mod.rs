// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! Keyed read cache with request coalescing and invalidate-after-write.
//!
//! Each read names a [`QueryKey`] and a producer. While a key has a request
//! in flight, further reads of that key wait on the same request instead of
//! issuing their own. Writes go through [`QueryClient::mutate`], which marks
//! the affected keys stale once the write has succeeded and never before.
//!
//! Every fetch runs on its own task, so a consumer that gives up waiting
//! (through its [`CancellationToken`]) does not abort the request for the
//! other consumers of the key.

pub(crate) mod key;
pub(crate) mod rules;

use std::{any::Any, collections::HashMap, future::Future, sync::Arc, time::Duration};

use futures_util::{
    future::{BoxFuture, Shared},
    lock::Mutex,
    FutureExt as _,
};
use log::{debug, warn};
use tokio::{
    sync::watch,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Internal, Result};

pub(crate) use self::{
    key::{QueryKey, Resource},
    rules::{Change, Invalidation},
};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

type Value = Arc<dyn Any + Send + Sync>;
type Pending = Shared<BoxFuture<'static, Result<Value, Arc<Error>>>>;

#[derive(Clone, Debug)]
pub(crate) struct Options {
    /// Additional attempts made for a read that failed without a response.
    pub(crate) read_retries: u32,
    /// Delay before the first retry. Doubles on each further attempt.
    pub(crate) retry_delay: Duration,
    /// Age after which an entry is refetched even if nothing invalidated it.
    pub(crate) stale_after: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            read_retries: 3,
            retry_delay: Duration::from_millis(250),
            stale_after: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Status {
    Idle,
    Loading,
    Success,
    Error,
}

struct Entry {
    status: Status,
    data: Option<Value>,
    fetched_at: Option<Instant>,
    stale: bool,
    generation: u64,
    in_flight: Option<Pending>,
}

impl Entry {
    const fn new() -> Self {
        Self {
            status: Status::Idle,
            data: None,
            fetched_at: None,
            stale: false,
            generation: 0,
            in_flight: None,
        }
    }

    fn fresh(&self, stale_after: Option<Duration>) -> Option<Value> {
        if self.status != Status::Success || self.stale {
            return None;
        }
        if let (Some(limit), Some(fetched_at)) = (stale_after, self.fetched_at) {
            if fetched_at.elapsed() >= limit {
                return None;
            }
        }
        self.data.clone()
    }

    fn settle(&mut self, result: &Result<Value, Arc<Error>>) {
        self.in_flight = None;
        match *result {
            Ok(ref value) => {
                self.status = Status::Success;
                self.data = Some(Arc::clone(value));
                self.fetched_at = Some(Instant::now());
                self.stale = false;
            }
            Err(_) => self.status = Status::Error,
        }
    }
}

/// A declared read: its key, whether it may be issued yet, and how to
/// produce its value.
pub(crate) struct Query<F> {
    key: QueryKey,
    enabled: bool,
    producer: F,
}

impl<F> Query<F> {
    pub(crate) const fn new(key: QueryKey, producer: F) -> Self {
        Self {
            key,
            enabled: true,
            producer,
        }
    }

    /// A disabled query resolves to nothing without calling its producer.
    pub(crate) fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// The latest result of a polled read.
pub(crate) enum Observed<T> {
    Loading,
    Ready(Arc<T>),
    Failed(Arc<Error>),
}

#[derive(Clone)]
pub(crate) struct QueryClient {
    entries: Arc<Mutex<HashMap<QueryKey, Entry>>>,
    options: Arc<Options>,
}

impl QueryClient {
    pub(crate) fn new(options: Options) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            options: Arc::new(options),
        }
    }

    pub(crate) async fn read<T, F, Fut>(
        &self,
        query: Query<F>,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<T>>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if !query.enabled {
            debug!("Not reading {} while it is disabled", query.key);
            return Ok(None);
        }

        self.fetch(&query.key, cancel, query.producer)
            .await
            .map(Some)
    }

    /// Reads a key that is always enabled.
    pub(crate) async fn fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        cancel: &CancellationToken,
        producer: F,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.load(key, cancel, false, producer).await
    }

    async fn load<T, F, Fut>(
        &self,
        key: &QueryKey,
        cancel: &CancellationToken,
        force: bool,
        producer: F,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);

            if let (false, Some(data)) = (force, entry.fresh(self.options.stale_after)) {
                debug!("Cache hit for {}", key);
                return downcast(key, data);
            }

            if let Some(ref pending) = entry.in_flight {
                debug!("Joining the request already in flight for {}", key);
                pending.clone()
            } else {
                debug!("Fetching {}", key);
                let pending = self.start(key.clone(), entry.generation, producer);
                entry.status = Status::Loading;
                entry.in_flight = Some(pending.clone());
                pending
            }
        };

        let value = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            value = pending => value?,
        };
        downcast(key, value)
    }

    fn start<T, F, Fut>(&self, key: QueryKey, generation: u64, producer: F) -> Pending
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let options = Arc::clone(&self.options);

        let task = tokio::spawn(async move {
            let result = with_retries(&options, &key, producer)
                .await
                .map(|value| -> Value { Arc::new(value) })
                .map_err(Arc::new);

            if let Some(entry) = entries.lock().await.get_mut(&key) {
                if entry.generation == generation {
                    entry.settle(&result);
                } else {
                    debug!("Discarding a superseded response for {}", key);
                }
            }
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(Arc::new(Error::from(e))),
            }
        }
        .boxed()
        .shared()
    }

    /// Marks every matching entry stale. Requests still in flight for those
    /// entries are detached: their waiters get the response, but the entry
    /// does not, and later reads start a new request.
    pub(crate) async fn invalidate(&self, invalidations: &[Invalidation]) {
        let mut entries = self.entries.lock().await;
        for (key, entry) in entries
            .iter_mut()
            .filter(|(key, _)| invalidations.iter().any(|i| i.matches(key)))
        {
            debug!("Invalidating {}", key);
            entry.stale = true;
            entry.generation += 1;
            entry.in_flight = None;
        }
    }

    /// Runs a write to completion and then applies the invalidations for
    /// `change`. The write is never retried, and it keeps running even if the
    /// caller stops waiting for it.
    pub(crate) async fn mutate<T, Fut>(&self, change: Change, write: Fut) -> Result<T>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            let value = write.await?;
            client.invalidate(&change.invalidations()).await;
            Ok::<_, Error>(value)
        })
        .await?
    }

    /// Re-reads `key` every `every`, whether or not the cached value is
    /// fresh, until `cancel` fires or every receiver is dropped.
    pub(crate) fn poll<T, F, Fut>(
        &self,
        key: QueryKey,
        every: Duration,
        cancel: CancellationToken,
        producer: F,
    ) -> watch::Receiver<Observed<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(Observed::Loading);
        let client = self.clone();
        let producer = Arc::new(producer);

        drop(tokio::spawn(async move {
            let mut ticks = time::interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticks.tick() => {}
                }

                let producer = Arc::clone(&producer);
                let observed = match client
                    .load(&key, &cancel, true, move || (*producer)())
                    .await
                {
                    Ok(value) => Observed::Ready(value),
                    Err(Error::Cancelled) => break,
                    Err(e) => Observed::Failed(Arc::new(e)),
                };
                if tx.send(observed).is_err() {
                    break;
                }
            }
            debug!("Stopped polling {}", key);
        }));

        rx
    }
}

async fn with_retries<T, F, Fut>(options: &Options, key: &QueryKey, producer: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = options.retry_delay;
    let mut attempt = 0_u32;
    loop {
        match producer().await {
            Err(e) if e.is_retryable_read() && attempt < options.read_retries => {
                attempt += 1;
                warn!(
                    "Reading {} failed ({}), retrying in {} ms (attempt {} of {})",
                    key,
                    e,
                    delay.as_millis(),
                    attempt,
                    options.read_retries
                );
                time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
            result => return result,
        }
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: Value) -> Result<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| Internal::CacheType(key.to_string()).into())
}
