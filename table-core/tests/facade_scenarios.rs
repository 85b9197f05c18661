//! End-to-end scenarios against the facade's bounded retry loop, driven by
//! a scriptable stub adapter and the deterministic virtual scheduler so no
//! test sleeps real wall-clock time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use table_core::{
    BackendAdapter, CellValue, ColumnDefinition, ColumnType, ConfigReader, MapConfigReader, StreamEventChunk, Table,
    TableDefinition, TableError, VirtualScheduler,
};
use table_errors::IsConnectionUnavailable;

#[derive(Debug, thiserror::Error)]
enum StubError {
    #[error("stub backend unavailable")]
    Unavailable,
    #[error("stub backend fatal: {0}")]
    Fatal(String),
}

impl IsConnectionUnavailable for StubError {
    fn is_connection_unavailable(&self) -> bool {
        matches!(self, StubError::Unavailable)
    }
}

/// A scriptable [`BackendAdapter`]: every primitive pops its next outcome
/// off a queue, defaulting to success once the queue runs dry, and counts
/// how many times each primitive actually ran.
#[derive(Default)]
struct StubAdapter {
    connect_results: Mutex<VecDeque<Result<(), StubError>>>,
    add_results: Mutex<VecDeque<Result<(), StubError>>>,
    connect_calls: Arc<AtomicUsize>,
    disconnect_calls: Arc<AtomicUsize>,
    destroy_calls: Arc<AtomicUsize>,
    add_calls: Arc<AtomicUsize>,
}

fn pop_or_ok(queue: &Mutex<VecDeque<Result<(), StubError>>>) -> Result<(), StubError> {
    queue.lock().pop_front().unwrap_or(Ok(()))
}

#[async_trait]
impl BackendAdapter for StubAdapter {
    type Error = StubError;

    async fn init(&mut self, _table_def: &TableDefinition, _config: &dyn ConfigReader) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        pop_or_ok(&self.connect_results)
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&mut self) -> Result<(), Self::Error> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add(&mut self, _chunk: StreamEventChunk) -> Result<(), Self::Error> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        pop_or_ok(&self.add_results)
    }

    async fn find(
        &mut self,
        _matching: &table_core::StateEvent,
        _condition: &table_core::CompiledCondition,
    ) -> Result<Vec<table_core::Row>, Self::Error> {
        Ok(Vec::new())
    }

    async fn delete(
        &mut self,
        _chunk: table_core::StateEventChunk,
        _condition: &table_core::CompiledCondition,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn update(
        &mut self,
        _chunk: table_core::StateEventChunk,
        _condition: &table_core::CompiledCondition,
        _update: &table_core::CompiledUpdateSet,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn update_or_add(
        &mut self,
        _chunk: table_core::StateEventChunk,
        _condition: &table_core::CompiledCondition,
        _update: &table_core::CompiledUpdateSet,
        _extractor: &table_core::AddingStreamEventExtractor,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn contains(
        &mut self,
        _matching: &table_core::StateEvent,
        _condition: &table_core::CompiledCondition,
    ) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

fn quotes_def() -> TableDefinition {
    TableDefinition::new(
        "quotes",
        vec![
            ColumnDefinition::new("symbol", ColumnType::Text),
            ColumnDefinition::new("price", ColumnType::BigInt),
        ],
    )
}

fn one_row() -> StreamEventChunk {
    StreamEventChunk::new(vec![vec![CellValue::Text("WSO2".into()), CellValue::BigInt(100)]])
}

#[tokio::test]
async fn happy_path_add_succeeds_after_implicit_connect() {
    let scheduler = Arc::new(VirtualScheduler::new());
    let table = Table::new("test-engine", quotes_def(), StubAdapter::default(), scheduler);
    table.init(&MapConfigReader::new()).await.unwrap();

    table.add_events(one_row()).await.unwrap();

    let state = table.lifecycle_state();
    assert!(state.connected);
    assert!(!state.trying_to_connect);
}

#[tokio::test]
async fn transient_disconnect_then_recovers_within_one_retry() {
    let mut adapter = StubAdapter::default();
    adapter.add_results.get_mut().push_back(Err(StubError::Unavailable));
    adapter.add_results.get_mut().push_back(Ok(()));
    let add_calls = adapter.add_calls.clone();
    let connect_calls = adapter.connect_calls.clone();

    let scheduler = Arc::new(VirtualScheduler::new());
    let table = Table::new("test-engine", quotes_def(), adapter, scheduler);
    table.init(&MapConfigReader::new()).await.unwrap();
    table.connect_with_retry().await.unwrap();
    assert_eq!(connect_calls.load(Ordering::SeqCst), 1);

    let result = table.add_events(one_row()).await;

    assert!(result.is_ok());
    assert_eq!(add_calls.load(Ordering::SeqCst), 2);
    assert_eq!(connect_calls.load(Ordering::SeqCst), 2);
    let state = table.lifecycle_state();
    assert!(state.connected);
    assert!(!state.trying_to_connect);
}

#[tokio::test]
async fn persistent_outage_drops_the_event_and_schedules_a_reconnect() {
    let mut adapter = StubAdapter::default();
    adapter.connect_results.get_mut().push_back(Err(StubError::Unavailable));
    let add_calls = adapter.add_calls.clone();

    let scheduler = Arc::new(VirtualScheduler::new());
    let table = Table::new("test-engine", quotes_def(), adapter, scheduler.clone());
    table.init(&MapConfigReader::new()).await.unwrap();

    let result = table.add_events(one_row()).await.unwrap();
    assert_eq!(result, ());
    assert_eq!(add_calls.load(Ordering::SeqCst), 0);

    let state = table.lifecycle_state();
    assert!(!state.connected);
    assert!(state.trying_to_connect);
    assert_eq!(scheduler.pending(), 1);

    // A second call during the scheduled window drops without touching
    // add() or scheduling a duplicate reconnect.
    table.add_events(one_row()).await.unwrap();
    assert_eq!(add_calls.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.pending(), 1);
}

#[tokio::test]
async fn scheduled_reconnect_eventually_restores_connectivity() {
    let mut adapter = StubAdapter::default();
    adapter.connect_results.get_mut().push_back(Err(StubError::Unavailable));

    let scheduler = Arc::new(VirtualScheduler::new());
    let table = Table::new("test-engine", quotes_def(), adapter, scheduler.clone());
    table.init(&MapConfigReader::new()).await.unwrap();

    table.add_events(one_row()).await.unwrap();
    assert!(!table.lifecycle_state().connected);

    let ran = scheduler.run_scheduled().await;
    assert_eq!(ran, 1);
    assert!(table.lifecycle_state().connected);

    table.add_events(one_row()).await.unwrap();
    let state = table.lifecycle_state();
    assert!(state.connected);
}

#[tokio::test]
async fn fatal_connect_error_propagates_and_clears_trying_to_connect() {
    let mut adapter = StubAdapter::default();
    adapter
        .connect_results
        .get_mut()
        .push_back(Err(StubError::Fatal("disk full".into())));

    let scheduler = Arc::new(VirtualScheduler::new());
    let table = Table::new("test-engine", quotes_def(), adapter, scheduler);
    table.init(&MapConfigReader::new()).await.unwrap();

    let err = table.add_events(one_row()).await.unwrap_err();
    assert!(matches!(err, TableError::Fatal { .. }));

    let state = table.lifecycle_state();
    assert!(!state.connected);
    assert!(!state.trying_to_connect);
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let adapter = StubAdapter::default();
    let disconnect_calls = adapter.disconnect_calls.clone();
    let destroy_calls = adapter.destroy_calls.clone();

    let scheduler = Arc::new(VirtualScheduler::new());
    let table = Table::new("test-engine", quotes_def(), adapter, scheduler);
    table.init(&MapConfigReader::new()).await.unwrap();
    table.connect_with_retry().await.unwrap();

    table.shutdown().await.unwrap();
    table.shutdown().await.unwrap();

    assert_eq!(disconnect_calls.load(Ordering::SeqCst), 1);
    assert_eq!(destroy_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn calls_after_shutdown_are_rejected() {
    let adapter = StubAdapter::default();
    let scheduler = Arc::new(VirtualScheduler::new());
    let table = Table::new("test-engine", quotes_def(), adapter, scheduler);
    table.init(&MapConfigReader::new()).await.unwrap();
    table.shutdown().await.unwrap();

    let err = table.add_events(one_row()).await.unwrap_err();
    assert!(matches!(err, TableError::Internal(_)));
}

#[tokio::test]
async fn empty_chunk_still_performs_the_connection_check() {
    let adapter = StubAdapter::default();
    let add_calls = adapter.add_calls.clone();
    let connect_calls = adapter.connect_calls.clone();

    let scheduler = Arc::new(VirtualScheduler::new());
    let table = Table::new("test-engine", quotes_def(), adapter, scheduler);
    table.init(&MapConfigReader::new()).await.unwrap();

    table.add_events(StreamEventChunk::new(Vec::new())).await.unwrap();

    assert_eq!(connect_calls.load(Ordering::SeqCst), 1);
    assert_eq!(add_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connect_fails_n_times_then_succeeds_with_no_events_written_during_the_window() {
    let mut adapter = StubAdapter::default();
    adapter.connect_results.get_mut().push_back(Err(StubError::Unavailable));
    adapter.connect_results.get_mut().push_back(Err(StubError::Unavailable));
    adapter.connect_results.get_mut().push_back(Ok(()));
    let add_calls = adapter.add_calls.clone();

    let scheduler = Arc::new(VirtualScheduler::new());
    let table = Table::new("test-engine", quotes_def(), adapter, scheduler.clone());
    table.init(&MapConfigReader::new()).await.unwrap();

    // First call: connect fails, event dropped, one reconnect scheduled.
    table.add_events(one_row()).await.unwrap();
    assert!(!table.lifecycle_state().connected);
    assert_eq!(add_calls.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.pending(), 1);

    // The scheduled reconnect fails again and reschedules itself.
    assert_eq!(scheduler.run_scheduled().await, 1);
    assert!(!table.lifecycle_state().connected);
    assert_eq!(add_calls.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.pending(), 1);

    // The second scheduled reconnect succeeds.
    assert_eq!(scheduler.run_scheduled().await, 1);
    assert!(table.lifecycle_state().connected);
    assert_eq!(add_calls.load(Ordering::SeqCst), 0);

    table.add_events(one_row()).await.unwrap();
    assert_eq!(add_calls.load(Ordering::SeqCst), 1);
}
