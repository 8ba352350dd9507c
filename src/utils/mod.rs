pub mod psql;

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::{AppError, Result};

fn database_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]{0,62}$").expect("database name pattern is valid")
    })
}

/// Checks a database name before it is interpolated into DROP/CREATE.
pub fn validate_database_name(name: &str) -> Result<()> {
    if database_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "'{}' is not a valid database name (letters, digits, '_' and '-', at most 63 characters)",
            name
        )))
    }
}

/// Quotes a SQL identifier, doubling embedded double quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes a SQL string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Human readable byte count, in the spirit of `pg_size_pretty`.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["bytes", "kB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
