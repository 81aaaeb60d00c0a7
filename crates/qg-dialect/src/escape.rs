/// Identifiers are quoted with the dialect's quote character; any
/// internal occurrence of that character is escaped by doubling (§4.6).
pub fn quote_ident(quote: char, name: &str) -> String {
    let doubled = name.replace(quote, &format!("{quote}{quote}"));
    format!("{quote}{doubled}{quote}")
}

/// LIKE-pattern values escape `%`, `_`, and `\` before wrapping (§4.6).
/// Callers wrap the returned value in their own wildcard characters for
/// `startsWith`/`endsWith`/`contains`.
pub fn escape_like_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Aggregation function names are whitelisted case-insensitively (§4.6,
/// §9) — never interpolated without going through this check first.
pub const AGGREGATION_WHITELIST: &[&str] = &["count", "sum", "avg", "min", "max"];

pub fn whitelisted_aggregation_fn(name: &str) -> Option<&'static str> {
    AGGREGATION_WHITELIST
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(name))
        .copied()
}
