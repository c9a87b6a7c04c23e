//! Input validation and quoting utilities.
//!
//! Table and column names come from schema documents and source-file
//! headers, so nothing here assumes they are well formed. Names that fail
//! validation are still usable because every identifier reaching SQL goes
//! through [`quote_identifier`]; callers log the validation failure as a
//! warning instead of rejecting the name.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length for table names
pub const MAX_TABLE_NAME_LENGTH: usize = 255;

/// Maximum length for column names
pub const MAX_COLUMN_NAME_LENGTH: usize = 255;

/// Maximum length for descriptions used in comments
pub const MAX_DESCRIPTION_LENGTH: usize = 10000;

/// Errors that can occur during input validation.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains characters that need quoting
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),

    /// Input is a reserved word
    #[error("{field} cannot be a reserved word: {word}")]
    ReservedWord { field: &'static str, word: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a table name.
///
/// # Rules
///
/// - Must not be empty
/// - Must not exceed 255 characters
/// - Must start with a letter or underscore
/// - May contain letters, digits and underscores
/// - Cannot be a SQL reserved word
///
/// # Examples
///
/// ```
/// use semantic_loader::validation::input::validate_table_name;
///
/// assert!(validate_table_name("ANON_VIEWS").is_ok());
/// assert!(validate_table_name("").is_err());
/// assert!(validate_table_name("123_invalid").is_err());
/// ```
pub fn validate_table_name(name: &str) -> ValidationResult<()> {
    validate_identifier("table name", name, MAX_TABLE_NAME_LENGTH)
}

/// Validate a column name.
///
/// Same rules as [`validate_table_name`].
pub fn validate_column_name(name: &str) -> ValidationResult<()> {
    validate_identifier("column name", name, MAX_COLUMN_NAME_LENGTH)
}

fn validate_identifier(field: &'static str, name: &str, max: usize) -> ValidationResult<()> {
    let Some(first_char) = name.chars().next() else {
        return Err(ValidationError::Empty(field));
    };

    if name.len() > max {
        return Err(ValidationError::TooLong {
            field,
            max,
            actual: name.len(),
        });
    }

    if !first_char.is_alphabetic() && first_char != '_' {
        return Err(ValidationError::InvalidFormat(
            field,
            "must start with a letter or underscore".to_string(),
        ));
    }

    if let Some(c) = name.chars().find(|c| !c.is_alphanumeric() && *c != '_') {
        return Err(ValidationError::InvalidCharacters {
            field,
            reason: format!("invalid character: '{}'", c),
        });
    }

    if is_sql_reserved_word(name) {
        return Err(ValidationError::ReservedWord {
            field,
            word: name.to_string(),
        });
    }

    Ok(())
}

/// Validate a filename pattern used for table matching.
pub fn validate_file_pattern(pattern: &str) -> ValidationResult<()> {
    if pattern.trim().is_empty() {
        return Err(ValidationError::Empty("file pattern"));
    }
    if pattern.contains('/') || pattern.contains('\\') {
        return Err(ValidationError::InvalidCharacters {
            field: "file pattern",
            reason: "patterns match file names, not paths".to_string(),
        });
    }
    Ok(())
}

/// Validate a description string.
pub fn validate_description(desc: &str) -> ValidationResult<()> {
    if desc.len() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "description",
            max: MAX_DESCRIPTION_LENGTH,
            actual: desc.len(),
        });
    }

    Ok(())
}

/// Quote a SQL identifier.
///
/// Internal double quotes are doubled, so any name is safe to splice into a
/// statement.
///
/// # Examples
///
/// ```
/// use semantic_loader::validation::input::quote_identifier;
///
/// assert_eq!(quote_identifier("ANON_VIEWS"), "\"ANON_VIEWS\"");
/// assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL string literal, dropping control characters.
///
/// # Examples
///
/// ```
/// use semantic_loader::validation::input::quote_literal;
///
/// assert_eq!(quote_literal("user's id"), "'user''s id'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", sanitize_description(value).replace('\'', "''"))
}

/// Remove control characters other than whitespace from a description.
pub fn sanitize_description(desc: &str) -> String {
    desc.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Keywords that break unquoted DDL in DuckDB or Snowflake
const RESERVED_WORDS: &[&str] = &[
    "all", "alter", "and", "as", "between", "by", "case", "check", "constraint", "create",
    "default", "delete", "distinct", "drop", "else", "false", "foreign", "from", "grant", "group",
    "having", "in", "insert", "into", "is", "join", "key", "like", "limit", "not", "null", "on",
    "or", "order", "primary", "references", "revoke", "schema", "select", "set", "table", "then",
    "true", "union", "unique", "update", "values", "view", "when", "where",
];

fn is_sql_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.contains(&word.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(validate_column_name("TOTAL_VIEW_TIME_SEC").is_ok());
        assert_eq!(
            validate_column_name(""),
            Err(ValidationError::Empty("column name"))
        );
        assert!(matches!(
            validate_column_name("view time"),
            Err(ValidationError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_table_name("order"),
            Err(ValidationError::ReservedWord { .. })
        ));
        assert!(matches!(
            validate_table_name(&"A".repeat(300)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_file_pattern_rules() {
        assert!(validate_file_pattern("user_day_fact").is_ok());
        assert!(validate_file_pattern("  ").is_err());
        assert!(validate_file_pattern("data/views").is_err());
    }

    #[test]
    fn test_quote_literal_strips_control_chars() {
        assert_eq!(quote_literal("a\u{0007}b\nc"), "'ab c'");
    }
}
