//! Identifier checks and string escaping for SQL text.
//!
//! Drivers bind values as parameters but not identifiers, so table and
//! database names end up interpolated into SQL text. They must pass
//! [`is_valid_identifier`] first.
use crate::error::{IdentKind, SqlError, SqlResult};

/// Check a table or database name, optionally qualified as `schema.name`.
///
/// Each part must start with `_` or an ASCII letter and continue with `_`,
/// ASCII letters or digits. At most one `.` is allowed.
pub fn is_valid_identifier(name: &str) -> bool {
    match name.split_once('.') {
        Some((qualifier, local)) => is_valid_part(qualifier) && is_valid_part(local),
        None => is_valid_part(name),
    }
}

fn is_valid_part(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Validate an identifier before it is interpolated into SQL text.
pub fn require_identifier(kind: IdentKind, name: &str) -> SqlResult<()> {
    if name.is_empty() {
        return Err(SqlError::BlankIdentifier(kind));
    }
    if !is_valid_identifier(name) {
        return Err(SqlError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Double every `'` for use inside a single-quoted SQL literal.
pub fn escape_apostrophes(s: &str) -> String {
    s.replace('\'', "''")
}

/// Double every `"` for use inside a double-quoted SQL identifier.
pub fn escape_double_quotes(s: &str) -> String {
    s.replace('"', "\"\"")
}
