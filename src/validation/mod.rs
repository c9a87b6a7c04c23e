//! Validation functionality
//!
//! Identifier checks and SQL quoting shared by the schema parser, the DDL
//! renderer and the destination backends.

pub mod input;

pub use input::{
    ValidationError, ValidationResult, quote_identifier, quote_literal, validate_column_name,
    validate_description, validate_file_pattern, validate_table_name,
};
