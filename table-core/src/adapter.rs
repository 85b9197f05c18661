//! The backend adapter contract: the inward-facing primitives every
//! concrete backend (in-memory table, JDBC-style store, key-value cache)
//! must implement. Generalizes the shape of
//! `readyset_adapter::upstream_database::UpstreamDatabase`: an async trait
//! with an associated error type, rather than abstract-base-class
//! subclassing.

use async_trait::async_trait;
use table_compiled::{AddingStreamEventExtractor, CompiledCondition, CompiledUpdateSet};
use table_errors::IsConnectionUnavailable;
use table_schema::{Row, StateEvent, StateEventChunk, StreamEventChunk, TableDefinition};

use crate::config::ConfigReader;

/// Every primitive on this trait may fail with a transient,
/// connection-unavailable error (reported via
/// [`IsConnectionUnavailable::is_connection_unavailable`]) or a fatal one.
/// There is no third option: the facade treats anything that isn't
/// connection-unavailable as fatal and propagates it.
#[async_trait]
pub trait BackendAdapter: Send + Sync + 'static {
    /// The error type raised by this backend's primitives.
    type Error: std::error::Error + IsConnectionUnavailable + Send + Sync + 'static;

    /// One-shot initialization. Must not open network connections; those
    /// belong to [`BackendAdapter::connect`].
    async fn init(
        &mut self,
        table_def: &TableDefinition,
        config: &dyn ConfigReader,
    ) -> Result<(), Self::Error>;

    /// Establishes backend resources.
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Releases resources without destroying them.
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Releases everything. Must be idempotent.
    async fn destroy(&mut self) -> Result<(), Self::Error>;

    /// Inserts every row in `chunk`.
    async fn add(&mut self, chunk: StreamEventChunk) -> Result<(), Self::Error>;

    /// Returns every row matching `condition` against `matching`.
    async fn find(
        &mut self,
        matching: &StateEvent,
        condition: &CompiledCondition,
    ) -> Result<Vec<Row>, Self::Error>;

    /// Deletes every row matching `condition` against each event in `chunk`.
    async fn delete(
        &mut self,
        chunk: StateEventChunk,
        condition: &CompiledCondition,
    ) -> Result<(), Self::Error>;

    /// Updates every row matching `condition` against each event in `chunk`
    /// using `update`.
    async fn update(
        &mut self,
        chunk: StateEventChunk,
        condition: &CompiledCondition,
        update: &CompiledUpdateSet,
    ) -> Result<(), Self::Error>;

    /// For each event in `chunk`: updates the matching row if one exists,
    /// otherwise inserts the row `extractor` derives from the event.
    async fn update_or_add(
        &mut self,
        chunk: StateEventChunk,
        condition: &CompiledCondition,
        update: &CompiledUpdateSet,
        extractor: &AddingStreamEventExtractor,
    ) -> Result<(), Self::Error>;

    /// True if any row matches `condition` against `matching`.
    async fn contains(
        &mut self,
        matching: &StateEvent,
        condition: &CompiledCondition,
    ) -> Result<bool, Self::Error>;
}
