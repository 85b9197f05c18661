//! A working, in-memory [`BackendAdapter`] implementation: rows live in a
//! `Vec` guarded by a plain mutex rather than behind a network connection.
//! Still honors the full connect/disconnect lifecycle, so it exercises the
//! facade's retry path the same way a networked backend would.
//!
//! Grounded on the vec-of-rows-per-index shape of
//! `dataflow_state::keyed_state::KeyedState`, simplified down to a single
//! unindexed `Vec<Row>` scan per call; this backend optimizes for being a
//! small, auditable reference, not for query performance.

use async_trait::async_trait;
use parking_lot::Mutex;
use table_compiled::{AddingStreamEventExtractor, CompiledCondition, CompiledUpdateSet};
use table_core::{BackendAdapter, ConfigReader};
use table_errors::IsConnectionUnavailable;
use table_schema::{Row, StateEvent, StateEventChunk, StreamEventChunk, TableDefinition};

/// Failures the in-memory backend can report.
#[derive(Debug, thiserror::Error)]
pub enum MemoryBackendError {
    /// Raised by every primitive when called before [`BackendAdapter::connect`]
    /// or after [`BackendAdapter::disconnect`].
    #[error("memory backend for table `{0}` is not connected")]
    NotConnected(String),

    /// Raised by [`BackendAdapter::add`] / [`BackendAdapter::update_or_add`]
    /// when inserting would exceed the configured row cap.
    #[error("memory backend for table `{table_id}` is at capacity ({capacity} rows)")]
    CapacityExceeded { table_id: String, capacity: usize },
}

impl IsConnectionUnavailable for MemoryBackendError {
    fn is_connection_unavailable(&self) -> bool {
        matches!(self, MemoryBackendError::NotConnected(_))
    }
}

/// An in-memory reference backend. One instance backs exactly one table.
pub struct MemoryBackend {
    table_id: String,
    capacity: Option<usize>,
    connected: Mutex<bool>,
    rows: Mutex<Vec<Row>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            table_id: String::new(),
            capacity: None,
            connected: Mutex::new(false),
            rows: Mutex::new(Vec::new()),
        }
    }

    /// The rows currently stored, for test assertions.
    pub fn snapshot(&self) -> Vec<Row> {
        self.rows.lock().clone()
    }

    fn ensure_connected(&self) -> Result<(), MemoryBackendError> {
        if *self.connected.lock() {
            Ok(())
        } else {
            Err(MemoryBackendError::NotConnected(self.table_id.clone()))
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendAdapter for MemoryBackend {
    type Error = MemoryBackendError;

    async fn init(&mut self, table_def: &TableDefinition, config: &dyn ConfigReader) -> Result<(), Self::Error> {
        self.table_id = table_def.id.clone();
        self.capacity = config.get_u64("max_rows").map(|v| v as usize);
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        *self.connected.lock() = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        *self.connected.lock() = false;
        Ok(())
    }

    async fn destroy(&mut self) -> Result<(), Self::Error> {
        *self.connected.lock() = false;
        self.rows.lock().clear();
        Ok(())
    }

    async fn add(&mut self, chunk: StreamEventChunk) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        let mut rows = self.rows.lock();
        if let Some(capacity) = self.capacity {
            if rows.len() + chunk.len() > capacity {
                return Err(MemoryBackendError::CapacityExceeded {
                    table_id: self.table_id.clone(),
                    capacity,
                });
            }
        }
        rows.extend(chunk);
        Ok(())
    }

    async fn find(&mut self, matching: &StateEvent, condition: &CompiledCondition) -> Result<Vec<Row>, Self::Error> {
        self.ensure_connected()?;
        let rows = self.rows.lock();
        Ok(rows
            .iter()
            .filter(|row| condition.evaluate(row, &matching.matching))
            .cloned()
            .collect())
    }

    async fn delete(&mut self, chunk: StateEventChunk, condition: &CompiledCondition) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        let mut rows = self.rows.lock();
        for event in chunk {
            rows.retain(|row| !condition.evaluate(row, &event.matching));
        }
        Ok(())
    }

    async fn update(
        &mut self,
        chunk: StateEventChunk,
        condition: &CompiledCondition,
        update: &CompiledUpdateSet,
    ) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        let mut rows = self.rows.lock();
        for event in chunk {
            let matches: Vec<usize> = rows
                .iter()
                .enumerate()
                .filter(|(_, row)| condition.evaluate(row, &event.matching))
                .map(|(i, _)| i)
                .collect();
            for idx in matches {
                for (col, value) in update.evaluate(&rows[idx], &event) {
                    rows[idx][col] = value;
                }
            }
        }
        Ok(())
    }

    async fn update_or_add(
        &mut self,
        chunk: StateEventChunk,
        condition: &CompiledCondition,
        update: &CompiledUpdateSet,
        extractor: &AddingStreamEventExtractor,
    ) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        let mut rows = self.rows.lock();
        for event in chunk {
            let matched = rows
                .iter()
                .position(|row| condition.evaluate(row, &event.matching));
            match matched {
                Some(idx) => {
                    for (col, value) in update.evaluate(&rows[idx], &event) {
                        rows[idx][col] = value;
                    }
                }
                None => {
                    if let Some(capacity) = self.capacity {
                        if rows.len() + 1 > capacity {
                            return Err(MemoryBackendError::CapacityExceeded {
                                table_id: self.table_id.clone(),
                                capacity,
                            });
                        }
                    }
                    rows.push(extractor.extract(&event));
                }
            }
        }
        Ok(())
    }

    async fn contains(&mut self, matching: &StateEvent, condition: &CompiledCondition) -> Result<bool, Self::Error> {
        self.ensure_connected()?;
        let rows = self.rows.lock();
        Ok(rows.iter().any(|row| condition.evaluate(row, &matching.matching)))
    }
}
