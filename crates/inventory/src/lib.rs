//! Inventory domain module: the stock ledger and the stock projector.
//!
//! - `movement`: stock movement records, unit normalization and input validation
//! - `reason`: the reason table keyed by move type
//! - `projector`: how movements move a product's cached quantity, and as-of reconstruction
//! - `query`: ledger filters and grouped aggregation
//! - `report`: month cutoffs and end-of-month snapshot rows
//!
//! Deterministic domain logic only (no IO, no HTTP, no storage).

pub mod movement;
pub mod projector;
pub mod query;
pub mod reason;
pub mod report;

pub use movement::{
    MAX_NOTE_CHARS, MAX_QUANTITY, MoveType, MovementEdit, RecordMovement, StockMovement, Unit,
    ValidMovement, normalize_quantity,
};
pub use projector::{StockChange, StockProjector};
pub use query::{AggregateRow, GroupBy, GroupKey, MovementFilter, aggregate, fold_case};
pub use reason::Reason;
pub use report::{ReportMonth, SnapshotRow, start_of_day};
