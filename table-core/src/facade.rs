//! The table operation facade: the single entry point application code
//! holds, wiring together the backend adapter, the lifecycle state machine,
//! the backoff counter, and the scheduler into one bounded retry loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use table_backoff::BackoffCounter;
use table_compiled::{AddingStreamEventExtractor, Assignment, CompiledCondition, CompiledUpdateSet};
use table_errors::{internal, table_err, IsConnectionUnavailable, TableResult};
use table_schema::{Row, StateEvent, StateEventChunk, StreamEventChunk, TableDefinition};

use crate::adapter::BackendAdapter;
use crate::config::ConfigReader;
use crate::diagnostics::{describe_rows, describe_state_event, describe_state_events, truncate_payload};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::scheduler::Scheduler;

/// An async operation closure handed to [`Table::run`]: given exclusive
/// access to the adapter, performs exactly one backend primitive call.
type Primitive<'a, A, T> =
    Pin<Box<dyn Future<Output = Result<T, <A as BackendAdapter>::Error>> + Send + 'a>>;

/// The facade a query plan holds onto for the lifetime of a table. Cloning
/// a `Table` shares the same underlying adapter, lifecycle, and backoff
/// state; it is a handle, not a copy.
pub struct Table<A: BackendAdapter> {
    engine_name: Arc<str>,
    table_def: Arc<TableDefinition>,
    adapter: Arc<tokio::sync::Mutex<A>>,
    lifecycle: Arc<Lifecycle>,
    backoff: Arc<parking_lot::Mutex<BackoffCounter>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<A: BackendAdapter> Clone for Table<A> {
    fn clone(&self) -> Self {
        Self {
            engine_name: self.engine_name.clone(),
            table_def: self.table_def.clone(),
            adapter: self.adapter.clone(),
            lifecycle: self.lifecycle.clone(),
            backoff: self.backoff.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<A: BackendAdapter> Table<A> {
    /// Builds a facade over `adapter` for the table described by
    /// `table_def`, using `scheduler` to run reconnect attempts.
    /// `engine_name` identifies the owning engine context in diagnostics.
    pub fn new(
        engine_name: impl Into<String>,
        table_def: TableDefinition,
        adapter: A,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            engine_name: Arc::from(engine_name.into()),
            table_def: Arc::new(table_def),
            adapter: Arc::new(tokio::sync::Mutex::new(adapter)),
            lifecycle: Arc::new(Lifecycle::default()),
            backoff: Arc::new(parking_lot::Mutex::new(BackoffCounter::default())),
            scheduler,
        }
    }

    /// Overrides the default backoff floor/ceiling. Must be called before
    /// the first failed [`Table::connect_with_retry`].
    pub fn with_backoff_bounds(mut self, floor: Duration, ceiling: Duration) -> Self {
        self.backoff = Arc::new(parking_lot::Mutex::new(BackoffCounter::new(floor, ceiling)));
        self
    }

    pub fn table_definition(&self) -> &TableDefinition {
        &self.table_def
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.snapshot()
    }

    /// One-shot adapter initialization. Must be called once, before the
    /// first CRUD operation.
    pub async fn init(&self, config: &dyn ConfigReader) -> TableResult<()> {
        let mut guard = self.adapter.lock().await;
        guard
            .init(&self.table_def, config)
            .await
            .map_err(|e| table_err(self.table_def.id.clone(), e))
    }

    /// Compiles `update_set` against this table's schema.
    pub fn compile_update_set(
        &self,
        update_set: Vec<Assignment>,
        matching_arity: usize,
    ) -> TableResult<CompiledUpdateSet> {
        table_compiled::compile_update_set(update_set, &self.table_def, matching_arity)
    }

    /// Attempts to (re)establish the backend connection.
    ///
    /// If already connected, returns immediately. On a connection-unavailable
    /// failure, schedules a future reconnect attempt after the current
    /// backoff delay and returns `Ok(())`; the caller never sees this kind
    /// of failure directly. On any other failure, clears `trying_to_connect`
    /// and propagates the error: a conservative choice, since stranding the
    /// table with `trying_to_connect` permanently set would silently drop
    /// every future call without ever attempting to recover.
    pub async fn connect_with_retry(&self) -> TableResult<()> {
        if self.lifecycle.is_connected() {
            return Ok(());
        }
        self.lifecycle.set_trying_to_connect(true);

        let result = {
            let mut guard = self.adapter.lock().await;
            guard.connect().await
        };

        match result {
            Ok(()) => {
                self.lifecycle.set_connected(true);
                self.lifecycle.set_trying_to_connect(false);
                self.backoff.lock().reset();
                tracing::info!(
                    engine = %self.engine_name,
                    table_id = %self.table_def.id,
                    "connected to backend"
                );
                Ok(())
            }
            Err(e) if e.is_connection_unavailable() => {
                let (delay, rendered) = {
                    let mut b = self.backoff.lock();
                    let current = b.current();
                    b.increment();
                    current
                };
                tracing::warn!(
                    engine = %self.engine_name,
                    table_id = %self.table_def.id,
                    cause = %e,
                    retry_in = %rendered,
                    "connect failed; scheduling retry"
                );
                let this = self.clone();
                self.scheduler.schedule(
                    delay,
                    Box::pin(async move {
                        if let Err(e) = this.connect_with_retry().await {
                            tracing::error!(
                                engine = %this.engine_name,
                                table_id = %this.table_def.id,
                                cause = %e,
                                "scheduled reconnect failed fatally"
                            );
                        }
                    }),
                );
                Ok(())
            }
            Err(e) => {
                self.lifecycle.set_trying_to_connect(false);
                tracing::error!(
                    engine = %self.engine_name,
                    table_id = %self.table_def.id,
                    cause = %e,
                    "connect failed fatally"
                );
                Err(table_err(self.table_def.id.to_string(), e))
            }
        }
    }

    /// Runs one backend primitive through the bounded retry loop.
    ///
    /// If the table is disconnected and not currently reconnecting, kicks
    /// off a reconnect attempt and loops. If a reconnect is already in
    /// flight, drops the call and returns `drop_value` rather than queuing
    /// up behind it. Otherwise invokes `op` once; on a
    /// connection-unavailable failure it marks the table disconnected and
    /// retries at most once more, falling back to the scheduled reconnect
    /// path (and `drop_value`) if the retry also fails to connect.
    async fn run<T, Op>(&self, op_name: &'static str, payload: String, drop_value: T, mut op: Op) -> TableResult<T>
    where
        Op: for<'a> FnMut(&'a mut A) -> Primitive<'a, A, T>,
    {
        if self.lifecycle.is_shut_down() {
            internal!("table `{}` has been shut down", self.table_def.id);
        }

        let mut retried = false;
        loop {
            if !self.lifecycle.is_connected() {
                if self.lifecycle.is_trying_to_connect() {
                    tracing::debug!(
                        engine = %self.engine_name,
                        table_id = %self.table_def.id,
                        operation = op_name,
                        payload = %payload,
                        "dropping event: reconnect already in flight"
                    );
                    return Ok(drop_value);
                }
                self.connect_with_retry().await?;
                if !self.lifecycle.is_connected() {
                    return Ok(drop_value);
                }
                continue;
            }

            let result = {
                let mut guard = self.adapter.lock().await;
                op(&mut *guard).await
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_connection_unavailable() => {
                    self.lifecycle.set_connected(false);
                    tracing::error!(
                        engine = %self.engine_name,
                        table_id = %self.table_def.id,
                        operation = op_name,
                        payload = %payload,
                        cause = %e,
                        "backend primitive failed: connection unavailable"
                    );
                    if retried {
                        self.connect_with_retry().await?;
                        return Ok(drop_value);
                    }
                    retried = true;
                    self.connect_with_retry().await?;
                    if !self.lifecycle.is_connected() {
                        return Ok(drop_value);
                    }
                }
                Err(e) => return Err(table_err(self.table_def.id.to_string(), e)),
            }
        }
    }

    /// Inserts every row in `chunk`. Consumes the chunk.
    pub async fn add_events(&self, chunk: StreamEventChunk) -> TableResult<()> {
        let payload = truncate_payload(&describe_rows(&chunk.0));
        self.run("add_events", payload, (), move |a: &mut A| {
            let chunk = chunk.clone();
            Box::pin(async move { a.add(chunk).await })
        })
        .await
    }

    /// Returns every row matching `condition` against `matching`.
    pub async fn find(&self, matching: &StateEvent, condition: &CompiledCondition) -> TableResult<Vec<Row>> {
        let payload = truncate_payload(&describe_state_event(matching));
        let matching = matching.clone();
        let condition = condition.clone();
        self.run("find", payload, Vec::new(), move |a: &mut A| {
            let matching = matching.clone();
            let condition = condition.clone();
            Box::pin(async move { a.find(&matching, &condition).await })
        })
        .await
    }

    /// Deletes every row matching `condition` against each event in
    /// `chunk`. Consumes the chunk.
    pub async fn delete_events(&self, chunk: StateEventChunk, condition: &CompiledCondition) -> TableResult<()> {
        let payload = truncate_payload(&describe_state_events(&chunk.0));
        let condition = condition.clone();
        self.run("delete_events", payload, (), move |a: &mut A| {
            let chunk = chunk.clone();
            let condition = condition.clone();
            Box::pin(async move { a.delete(chunk, &condition).await })
        })
        .await
    }

    /// Updates every row matching `condition` against each event in `chunk`
    /// using `update`. Consumes the chunk.
    pub async fn update_events(
        &self,
        chunk: StateEventChunk,
        condition: &CompiledCondition,
        update: &CompiledUpdateSet,
    ) -> TableResult<()> {
        let payload = truncate_payload(&describe_state_events(&chunk.0));
        let condition = condition.clone();
        let update = update.clone();
        self.run("update_events", payload, (), move |a: &mut A| {
            let chunk = chunk.clone();
            let condition = condition.clone();
            let update = update.clone();
            Box::pin(async move { a.update(chunk, &condition, &update).await })
        })
        .await
    }

    /// For each event in `chunk`: updates the matching row if one exists,
    /// otherwise inserts the row `extractor` derives from the event.
    /// Consumes the chunk.
    pub async fn update_or_add_events(
        &self,
        chunk: StateEventChunk,
        condition: &CompiledCondition,
        update: &CompiledUpdateSet,
        extractor: &AddingStreamEventExtractor,
    ) -> TableResult<()> {
        let payload = truncate_payload(&describe_state_events(&chunk.0));
        let condition = condition.clone();
        let update = update.clone();
        let extractor = extractor.clone();
        self.run("update_or_add_events", payload, (), move |a: &mut A| {
            let chunk = chunk.clone();
            let condition = condition.clone();
            let update = update.clone();
            let extractor = extractor.clone();
            Box::pin(async move { a.update_or_add(chunk, &condition, &update, &extractor).await })
        })
        .await
    }

    /// True if any row matches `condition` against `matching`.
    pub async fn contains_event(&self, matching: &StateEvent, condition: &CompiledCondition) -> TableResult<bool> {
        let payload = truncate_payload(&describe_state_event(matching));
        let matching = matching.clone();
        let condition = condition.clone();
        self.run("contains_event", payload, false, move |a: &mut A| {
            let matching = matching.clone();
            let condition = condition.clone();
            Box::pin(async move { a.contains(&matching, &condition).await })
        })
        .await
    }

    /// Releases and destroys the backend adapter. Idempotent: every call
    /// after the first is a no-op.
    pub async fn shutdown(&self) -> TableResult<()> {
        if !self.lifecycle.mark_shut_down() {
            return Ok(());
        }
        let (disconnect_result, destroy_result) = {
            let mut guard = self.adapter.lock().await;
            let disconnect_result = guard.disconnect().await;
            let destroy_result = guard.destroy().await;
            (disconnect_result, destroy_result)
        };
        self.lifecycle.set_connected(false);
        self.lifecycle.set_trying_to_connect(false);
        tracing::info!(
            engine = %self.engine_name,
            table_id = %self.table_def.id,
            "table shut down"
        );
        disconnect_result.map_err(|e| table_err(self.table_def.id.to_string(), e))?;
        destroy_result.map_err(|e| table_err(self.table_def.id.to_string(), e))?;
        Ok(())
    }
}
