use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref API_NAME_RE: Regex = Regex::new(r"^[a-z][a-zA-Z0-9]*$").unwrap();
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "select", "from", "where", "join", "group", "order", "by", "having", "limit", "offset",
        "and", "or", "not", "in", "as", "on", "union", "insert", "update", "delete", "table",
        "column", "null", "true", "false", "distinct", "count", "sum", "avg", "min", "max",
    ]
    .into_iter()
    .collect();
}

/// Every user-facing identifier is an apiName: `^[a-z][a-zA-Z0-9]*$`, 1-64
/// chars, not a reserved word. Physical names never cross this boundary.
pub fn is_valid_api_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    if RESERVED_WORDS.contains(name) {
        return false;
    }
    API_NAME_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_camel_case() {
        assert!(is_valid_api_name("orderId"));
        assert!(is_valid_api_name("a"));
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(!is_valid_api_name(""));
        assert!(!is_valid_api_name("Order"));
        assert!(!is_valid_api_name("order_id"));
        assert!(!is_valid_api_name("1order"));
        assert!(!is_valid_api_name(&"a".repeat(65)));
    }

    #[test]
    fn rejects_reserved_words() {
        assert!(!is_valid_api_name("select"));
        assert!(!is_valid_api_name("from"));
    }
}
