//! Placeholder resolution (component C1).
//!
//! Recognizes three forms in any string:
//!
//! - `${NAME}` — fails with [`RuntimeError::MissingEnvVar`] if `NAME` is not
//!   set and has no default.
//! - `${NAME:-default}` — uses the process environment if set *and
//!   non-empty*; otherwise the literal default (which may itself be empty).
//! - `$env:NAME` — raw environment read; missing variables yield an empty
//!   string (this preserves a legacy shape some imported configs rely on).
//!
//! A literal `$` is produced by `$$`. Resolution is single-pass: results are
//! never rescanned, so a default value containing `${...}` is inserted
//! verbatim rather than recursively resolved.

use mcporter_core::{Result, RuntimeError};

/// Resolve placeholders against the current process environment.
pub fn resolve(input: &str) -> Result<String> {
    resolve_with(input, |name| std::env::var(name).ok())
}

/// Resolve placeholders against an arbitrary environment lookup.
///
/// Exists separately from [`resolve`] so tests (and anything that wants a
/// frozen environment snapshot) don't have to mutate `std::env` to exercise
/// the parser.
pub fn resolve_with<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let len = input.len();
    let mut idx = 0;

    while idx < chars.len() {
        let (byte_pos, ch) = chars[idx];
        if ch != '$' {
            out.push(ch);
            idx += 1;
            continue;
        }

        let rest = &input[byte_pos..];

        if rest.starts_with("$$") {
            out.push('$');
            idx += 2;
            continue;
        }

        if rest.starts_with("${") {
            let close_rel = rest.find('}').ok_or_else(|| {
                RuntimeError::MissingEnvVar(format!("unterminated placeholder in `{input}`"))
            })?;
            let inner = &rest[2..close_rel];
            let resolved = if let Some(sep) = inner.find(":-") {
                let name = &inner[..sep];
                let default = &inner[sep + 2..];
                match lookup(name) {
                    Some(v) if !v.is_empty() => v,
                    _ => default.to_string(),
                }
            } else {
                lookup(inner).ok_or_else(|| RuntimeError::MissingEnvVar(inner.to_string()))?
            };
            out.push_str(&resolved);
            let consumed_bytes = close_rel + 1;
            idx = advance_char_index(&chars, idx, byte_pos + consumed_bytes, len);
            continue;
        }

        if rest.starts_with("$env:") {
            let name_start = 5;
            let name_rel_end = rest[name_start..]
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .map(|p| name_start + p)
                .unwrap_or(rest.len());
            let name = &rest[name_start..name_rel_end];
            out.push_str(&lookup(name).unwrap_or_default());
            idx = advance_char_index(&chars, idx, byte_pos + name_rel_end, len);
            continue;
        }

        // A bare `$` not matching any recognized form is passed through.
        out.push('$');
        idx += 1;
    }

    Ok(out)
}

/// Find the index into `chars` whose byte offset equals `target_byte`
/// (or the end of the char list once `target_byte` reaches `len`).
fn advance_char_index(chars: &[(usize, char)], from: usize, target_byte: usize, len: usize) -> usize {
    if target_byte >= len {
        return chars.len();
    }
    let mut i = from;
    while i < chars.len() && chars[i].0 < target_byte {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn resolves_simple_var() {
        let env = env_of(&[("NAME", "world")]);
        let out = resolve_with("hello ${NAME}", |k| env.get(k).cloned()).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn missing_var_without_default_fails() {
        let err = resolve_with("${MISSING}", |_| None).unwrap_err();
        assert!(matches!(err, RuntimeError::MissingEnvVar(name) if name == "MISSING"));
    }

    #[test]
    fn default_used_when_unset() {
        let out = resolve_with("${MISSING:-fallback}", |_| None).unwrap();
        assert_eq!(out, "fallback");
    }

    #[test]
    fn default_used_when_set_but_empty() {
        let env = env_of(&[("EMPTY", "")]);
        let out = resolve_with("${EMPTY:-fallback}", |k| env.get(k).cloned()).unwrap();
        assert_eq!(out, "fallback");
    }

    #[test]
    fn empty_default_is_legal() {
        let out = resolve_with("${MISSING:-}", |_| None).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn env_colon_form_is_lenient() {
        let out = resolve_with("$env:MISSING", |_| None).unwrap();
        assert_eq!(out, "");
        let env = env_of(&[("PRESENT", "abc")]);
        let out = resolve_with("$env:PRESENT", |k| env.get(k).cloned()).unwrap();
        assert_eq!(out, "abc");
    }

    #[test]
    fn double_dollar_is_literal() {
        let out = resolve_with("price: $$5", |_| None).unwrap();
        assert_eq!(out, "price: $5");
    }

    #[test]
    fn single_pass_does_not_rescan_default() {
        // The default itself contains `${...}` syntax; it must not be
        // resolved recursively.
        let out = resolve_with("${MISSING:-${OTHER}}", |_| None).unwrap();
        assert_eq!(out, "${OTHER}");
    }

    #[test]
    fn header_token_s4_scenario() {
        let env = env_of(&[("LINEAR_API_KEY", "abc")]);
        let out = resolve_with("Bearer ${LINEAR_API_KEY}", |k| env.get(k).cloned()).unwrap();
        assert_eq!(out, "Bearer abc");

        let err = resolve_with("Bearer ${LINEAR_API_KEY}", |_| None).unwrap_err();
        assert!(matches!(err, RuntimeError::MissingEnvVar(_)));
    }
}
