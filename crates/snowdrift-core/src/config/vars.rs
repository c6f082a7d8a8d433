//! Environment variable interpolation for config files.
//!
//! Supports the following syntax:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`
//!
//! Values substituted inside a quoted YAML scalar are escaped for that
//! scalar, so they parse back to exactly the environment value. Defaults
//! are written by the config author and are inserted as-is.
//!
//! The built-in service configuration is written in terms of these
//! placeholders, which is how plain environment variables such as
//! `DELTA_INTERVAL_MS` reach the typed config.

use regex::Regex;
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # Escape sequence $$
        |
        \$\{                           # Opening ${
            ([A-Za-z_][A-Za-z0-9_]*)   # Variable name (capture group 1)
            (?:                        # Optional default value group
                (:?-)                  # :- or just - (capture group 2)
                ([^}]*)                # Default value (capture group 3)
            )?
        \}                             # Closing }
        |
        \$([A-Za-z_][A-Za-z0-9_]*)     # Unbraced $VAR (capture group 4)
        ",
    )
    .expect("Invalid regex pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Any errors encountered during interpolation.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate environment variables in the given text.
///
/// All errors are accumulated so every missing variable is reported at once.
pub fn interpolate(input: &str) -> InterpolationResult {
    interpolate_with(input, |name| env::var(name).ok())
}

/// YAML scalar style at a position within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    Plain,
    Single,
    Double,
}

/// Scan `line` (the text before a placeholder) for an unterminated quote.
///
/// A quote only opens a scalar where one can start: at the beginning of the
/// line or after an indicator such as `:`, `-`, `[` or `,`.
fn quoting_at(line: &str) -> Quoting {
    let mut quoting = Quoting::Plain;
    let mut scalar_start = true;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match (quoting, c) {
            (Quoting::Plain, '#') if scalar_start => return Quoting::Plain,
            (Quoting::Plain, '"') if scalar_start => quoting = Quoting::Double,
            (Quoting::Plain, '\'') if scalar_start => quoting = Quoting::Single,
            (Quoting::Plain, ':' | '-' | '[' | '{' | ',' | '?') => scalar_start = true,
            (Quoting::Plain, c) if c.is_whitespace() => {}
            (Quoting::Plain, _) => scalar_start = false,
            (Quoting::Double, '\\') => {
                chars.next();
            }
            (Quoting::Double, '"') | (Quoting::Single, '\'') => {
                quoting = Quoting::Plain;
                scalar_start = false;
            }
            (Quoting::Double | Quoting::Single, _) => {}
        }
    }
    quoting
}

fn escape_for(quoting: Quoting, value: String) -> String {
    match quoting {
        Quoting::Plain => value,
        Quoting::Single => value.replace('\'', "''"),
        Quoting::Double => value.replace('\\', "\\\\").replace('"', "\\\""),
    }
}

/// Interpolate using an arbitrary variable lookup.
///
/// `interpolate` delegates here with the process environment; tests pass a
/// map so they never touch global state.
pub fn interpolate_with<F>(input: &str, lookup: F) -> InterpolationResult
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let Some(whole) = caps.get(0) else {
                return String::new();
            };
            let full_match = whole.as_str();

            if full_match == "$$" {
                return "$".to_string();
            }

            let var_name = caps
                .get(1)
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");

            let default_syntax = caps.get(2).map(|m| m.as_str());
            let default_value = caps.get(3).map(|m| m.as_str());

            match lookup(var_name) {
                Some(value) => {
                    // Newlines would let a variable inject extra YAML keys
                    if value.contains('\n') || value.contains('\r') {
                        errors.push(format!(
                            "environment variable '{var_name}' contains newlines, which is not allowed"
                        ));
                        return full_match.to_string();
                    }

                    if value.is_empty() && default_syntax == Some(":-") {
                        return default_value.unwrap_or("").to_string();
                    }

                    let line_start = input[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
                    escape_for(quoting_at(&input[line_start..whole.start()]), value)
                }
                None => {
                    if let Some(default) = default_value {
                        default.to_string()
                    } else {
                        errors.push(format!("environment variable '{var_name}' is not set"));
                        full_match.to_string()
                    }
                }
            }
        })
        .to_string();

    InterpolationResult { text, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_basic_substitution() {
        let result = interpolate_with("interval_ms: $DELTA_INTERVAL_MS", lookup(&[("DELTA_INTERVAL_MS", "250")]));
        assert!(result.is_ok());
        assert_eq!(result.text, "interval_ms: 250");
    }

    #[test]
    fn test_braced_substitution() {
        let result = interpolate_with(
            "relative_path: \"${RELATIVE_FILE_PATH}\"",
            lookup(&[("RELATIVE_FILE_PATH", "deltas")]),
        );
        assert!(result.is_ok());
        assert_eq!(result.text, "relative_path: \"deltas\"");
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let result = interpolate_with("a: $FIRST_MISSING\nb: ${SECOND_MISSING}", lookup(&[]));
        assert!(!result.is_ok());
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("FIRST_MISSING"));
        assert!(result.errors[1].contains("SECOND_MISSING"));
    }

    #[test]
    fn test_default_value_unset() {
        let result = interpolate_with("interval_ms: ${DELTA_INTERVAL_MS:-1000}", lookup(&[]));
        assert!(result.is_ok());
        assert_eq!(result.text, "interval_ms: 1000");
    }

    #[test]
    fn test_colon_default_applies_to_empty_value() {
        let result = interpolate_with("key: \"${KEY:-fallback}\"", lookup(&[("KEY", "")]));
        assert_eq!(result.text, "key: \"fallback\"");
    }

    #[test]
    fn test_dash_default_keeps_empty_value() {
        let result = interpolate_with("key: \"${KEY-fallback}\"", lookup(&[("KEY", "")]));
        assert_eq!(result.text, "key: \"\"");
    }

    #[test]
    fn test_empty_default() {
        let result = interpolate_with("key: \"${KEY:-}\"", lookup(&[]));
        assert!(result.is_ok());
        assert_eq!(result.text, "key: \"\"");
    }

    #[test]
    fn test_newline_injection_rejected() {
        let result = interpolate_with("key: $KEY", lookup(&[("KEY", "a\nb: c")]));
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("newlines"));
    }

    #[test]
    fn test_double_quoted_values_are_escaped() {
        let result = interpolate_with(
            "key: \"${KEY:-}\"",
            lookup(&[("KEY", r#"a"b\c\t"#)]),
        );
        assert!(result.is_ok());
        assert_eq!(result.text, r#"key: "a\"b\\c\\t""#);
    }

    #[test]
    fn test_single_quoted_values_are_escaped() {
        let result = interpolate_with("key: '${KEY}'", lookup(&[("KEY", "it's")]));
        assert_eq!(result.text, "key: 'it''s'");
    }

    #[test]
    fn test_plain_values_are_untouched() {
        let result = interpolate_with(
            "interval_ms: ${DELTA_INTERVAL_MS} # \"quoted\" comment",
            lookup(&[("DELTA_INTERVAL_MS", "250")]),
        );
        assert_eq!(result.text, "interval_ms: 250 # \"quoted\" comment");
    }

    #[test]
    fn test_apostrophe_inside_plain_scalar() {
        let result = interpolate_with("note: it's $NAME", lookup(&[("NAME", "o'neil")]));
        assert_eq!(result.text, "note: it's o'neil");
    }

    #[test]
    fn test_closed_quotes_before_placeholder() {
        let result = interpolate_with(
            "types: [\"a\\\"b\", $NEXT]",
            lookup(&[("NEXT", r#"x"y"#)]),
        );
        assert_eq!(result.text, r#"types: ["a\"b", x"y]"#);
    }

    #[test]
    fn test_escape_sequence() {
        let result = interpolate("price: $$100");
        assert!(result.is_ok());
        assert_eq!(result.text, "price: $100");
    }
}
