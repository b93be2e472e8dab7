//! Parameter-store path conventions.
//!
//! Pure string functions with no AWS SDK dependency. These define where stack
//! outputs are published so other tooling can discover the audit resources.

/// Default prefix when the operator does not configure one.
pub fn default_prefix(environment: &str, stack_name: &str) -> String {
    format!("/{environment}/{stack_name}")
}

/// Normalize a prefix: leading slash, no trailing slash.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    format!("/{trimmed}")
}

/// Full parameter path for one published key.
pub fn parameter(prefix: &str, key: &str) -> String {
    format!("{}/{}", normalize_prefix(prefix), output_key_to_segment(key))
}

/// Strip the prefix from a full parameter path, returning the key segment.
pub fn key_under<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    let prefix = normalize_prefix(prefix);
    path.strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}

/// `TrailArn` → `trail-arn`.
pub fn output_key_to_segment(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '_' {
            out.push('-');
        } else {
            out.push(ch);
        }
    }
    out
}
