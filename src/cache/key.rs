//! Deterministic cache keys.

use crate::tenant::normalize_tenant;

const SEPARATOR: char = '\u{1f}';

/// Builds the response-cache key for a tenant, locale and query.
///
/// The query is case-folded and its whitespace collapsed, so trivially
/// different spellings of the same question share one entry. Fields are
/// joined with the ASCII unit separator, which ordinary text never contains.
pub fn cache_key(tenant_id: &str, locale: &str, query: &str) -> String {
    let tenant = normalize_tenant(tenant_id);
    let locale = locale.trim().to_lowercase();
    let query = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut key = String::with_capacity(tenant.len() + locale.len() + query.len() + 2);
    key.push_str(tenant);
    key.push(SEPARATOR);
    key.push_str(&locale);
    key.push(SEPARATOR);
    key.push_str(&query);
    key
}
