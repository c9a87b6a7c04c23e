//! Source-to-schema mapping
//!
//! - [`columns`]: reconciles source headers with canonical column names
//! - [`coerce`]: turns raw text values into typed cells

pub mod coerce;
pub mod columns;

pub use coerce::{CoercionFailure, CoercionReport, CoercionRules, TypeCoercer};
pub use columns::{ColumnMapping, ColumnReconciler, ReconciledHeaders};
