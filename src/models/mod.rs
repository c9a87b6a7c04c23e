//! Models module
//!
//! In-memory schema model produced by the schema parser and consumed by the
//! provisioner, loader and verifier, plus the typed row batches that flow
//! into the destination.

pub mod column;
pub mod enums;
pub mod row;
pub mod schema;
pub mod table;

pub use column::ColumnDefinition;
pub use enums::*;
pub use row::{CellValue, RowBatch};
pub use schema::SchemaDefinition;
pub use table::{TableSchema, TableShape};
