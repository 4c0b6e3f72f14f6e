//! Key naming for plaintext bodies.
//!
//! Every object key the collector receives is snake_case, including the
//! keys of free-form parameter maps. Keys already in snake_case pass
//! through unchanged.

/// Convert a camelCase or PascalCase key to snake_case.
///
/// Word boundaries fall before an upper-case letter that follows a
/// lower-case letter or digit, and before the last letter of an upper-case
/// run that is followed by a lower-case letter (`myURLValue` becomes
/// `my_url_value`). Leading and trailing underscores are kept.
pub fn snake_case_key(key: &str) -> String {
    let start = key.len() - key.trim_start_matches('_').len();
    let end = key.trim_end_matches('_').len();
    if start >= end {
        return key.to_string();
    }

    let chars: Vec<char> = key[start..end].chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    out.push_str(&key[..start]);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = if prev.is_uppercase() {
                next_is_lower
            } else {
                prev != '_'
            };
            if boundary {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out.push_str(&key[end..]);
    out
}
