//! The table operation facade: the connection lifecycle state machine, the
//! backend adapter contract, and the bounded-retry CRUD operations built on
//! top of them.
//!
//! Application code constructs one [`Table`] per logical table, wired to a
//! concrete [`BackendAdapter`] implementation and a [`Scheduler`], and talks
//! to the backend exclusively through the facade from then on.

mod adapter;
mod config;
mod diagnostics;
mod facade;
mod lifecycle;
mod scheduler;

pub use adapter::BackendAdapter;
pub use config::{ConfigReader, MapConfigReader};
pub use facade::Table;
pub use lifecycle::LifecycleState;
pub use scheduler::{ScheduledTask, Scheduler, TokioScheduler, VirtualScheduler};

pub use table_backoff::BackoffCounter;
pub use table_compiled::{
    compile_condition, compile_update_set, AddingStreamEventExtractor, Assignment, CompiledCondition,
    CompiledUpdateSet, Predicate, ValueRef,
};
pub use table_errors::{TableError, TableResult};
pub use table_schema::{
    CellValue, ColumnDefinition, ColumnType, Row, StateEvent, StateEventChunk, StreamEventChunk, TableDefinition,
};
