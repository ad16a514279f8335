//! Syntax validation for table names and entity keys
//!
//! These checks run locally so a batch containing a doomed operation is
//! rejected before anything goes on the wire.

use once_cell::sync::Lazy;
use regex::Regex;

/// Table names: alphanumeric, starting with a letter, 3 to 63 characters.
static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]{2,62}$").expect("static pattern"));

/// Characters the service forbids in partition and row keys: path and query
/// delimiters plus C0/C1 control characters.
static KEY_FORBIDDEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[/\\#?\u{0000}-\u{001F}\u{007F}-\u{009F}]").expect("static pattern")
});

/// Maximum key length accepted by the service.
const MAX_KEY_CHARS: usize = 1024;

/// Whether `name` is a syntactically valid table name.
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME.is_match(name)
}

/// Whether `key` is usable as a partition key or row key.
///
/// The service itself accepts empty keys, but this client requires non-empty
/// keys so that an accidentally defaulted string does not address a real row.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().count() <= MAX_KEY_CHARS && !KEY_FORBIDDEN.is_match(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table_names() {
        assert!(is_valid_table_name("mytable"));
        assert!(is_valid_table_name("Table01"));
        assert!(is_valid_table_name("abc"));
        assert!(is_valid_table_name(&"a".repeat(63)));
    }

    #[test]
    fn test_invalid_table_names() {
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("ab"));
        assert!(!is_valid_table_name("1table"));
        assert!(!is_valid_table_name("this_table.cannot-exist!"));
        assert!(!is_valid_table_name(&"a".repeat(64)));
    }

    #[test]
    fn test_valid_keys() {
        assert!(is_valid_key("testingpartition"));
        assert!(is_valid_key("abcd1234_existing"));
        assert!(is_valid_key("key with spaces"));
        assert!(is_valid_key("quoted'key"));
    }

    #[test]
    fn test_invalid_keys() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("this/partition_key#is?invalid"));
        assert!(!is_valid_key("back\\slash"));
        assert!(!is_valid_key("hash#key"));
        assert!(!is_valid_key("question?key"));
        assert!(!is_valid_key("tab\tkey"));
        assert!(!is_valid_key("newline\nkey"));
        assert!(!is_valid_key(&"k".repeat(1025)));
    }
}
